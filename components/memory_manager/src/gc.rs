//! Cycle collector.
//!
//! Reference counts cannot free a group of objects that only reference each
//! other. Once per frame the player runs a mark/sweep pass over the whole
//! heap:
//!
//! 1. [`Heap::mark_all_garbage`] flags every object.
//! 2. [`Heap::unmark_reachable`] clears the flag on everything reachable
//!    from the roots and the builtin table.
//! 3. [`Heap::sweep`] destroys whatever is still flagged. Outgoing
//!    references of every doomed object are dropped before any object is
//!    removed, which breaks the cycles.

use crate::heap::Heap;
use core_types::{ObjectId, Value};
use tracing::debug;

/// Outcome of one [`Heap::collect`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Destroyed because their count was zero
    pub freed_by_count: usize,
    /// Destroyed by the sweep
    pub freed_by_sweep: usize,
    /// Objects alive afterwards
    pub live: usize,
}

impl Heap {
    /// Flags every live object as garbage.
    pub fn mark_all_garbage(&mut self) {
        for slot in &mut self.slots {
            if let Some(entry) = slot.entry.as_mut() {
                entry.garbage = true;
            }
        }
    }

    /// Clears the garbage flag. Returns true if it was set, meaning the
    /// object's references still need visiting.
    pub fn unmark(&mut self, id: ObjectId) -> bool {
        match self.entry_mut(id) {
            Some(entry) if entry.garbage => {
                entry.garbage = false;
                true
            }
            _ => false,
        }
    }

    /// True if `id` is live and currently flagged.
    pub fn is_marked_garbage(&self, id: ObjectId) -> bool {
        self.entry(id).is_some_and(|e| e.garbage)
    }

    /// Unmarks everything reachable from `roots` and from the builtin table.
    pub fn unmark_reachable(&mut self, roots: &[ObjectId]) {
        let mut work: Vec<ObjectId> = roots.to_vec();
        for value in self.builtins.values() {
            match value {
                Value::Object(id) => work.push(*id),
                Value::Property(accessor) => work.extend(
                    [accessor.getter, accessor.setter, accessor.target]
                        .into_iter()
                        .flatten(),
                ),
                _ => {}
            }
        }

        while let Some(id) = work.pop() {
            if !self.unmark(id) {
                continue;
            }
            if let Some(object) = self.get(id) {
                object.for_each_reference(|child| work.push(child));
            }
        }
    }

    /// Destroys every object still flagged as garbage. Returns the number
    /// destroyed.
    pub fn sweep(&mut self) -> usize {
        let doomed: Vec<ObjectId> = self
            .ids()
            .into_iter()
            .filter(|id| self.is_marked_garbage(*id))
            .collect();

        for id in &doomed {
            let refs = match self.entry_mut(*id) {
                Some(entry) => entry.object.clear_references(),
                None => continue,
            };
            for child in refs {
                self.release(child);
            }
        }
        for id in &doomed {
            self.remove_slot(*id);
        }

        self.stats.freed_by_sweep += doomed.len() as u64;
        doomed.len()
    }

    /// Full pass: zero-count reclamation, then mark, unmark from `roots`,
    /// sweep.
    ///
    /// # Examples
    ///
    /// ```
    /// use memory_manager::{Heap, ScriptObject};
    /// use core_types::Value;
    ///
    /// let mut heap = Heap::new();
    /// let a = heap.register(ScriptObject::plain());
    /// let b = heap.register(ScriptObject::plain());
    /// heap.put_member(a, "b", Value::Object(b));
    /// heap.put_member(b, "a", Value::Object(a));
    ///
    /// let report = heap.collect(&[]);
    /// assert_eq!(report.freed_by_sweep, 2);
    /// assert!(heap.is_empty());
    /// ```
    pub fn collect(&mut self, roots: &[ObjectId]) -> CollectReport {
        let freed_by_count = self.reclaim(roots);
        self.mark_all_garbage();
        self.unmark_reachable(roots);
        let freed_by_sweep = self.sweep();
        self.stats.collections += 1;

        let report = CollectReport {
            freed_by_count,
            freed_by_sweep,
            live: self.len(),
        };
        debug!(
            freed_by_count,
            freed_by_sweep,
            live = report.live,
            "collection finished"
        );
        report
    }
}
