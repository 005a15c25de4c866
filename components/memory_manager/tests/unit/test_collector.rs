//! Tests for reclamation and the cycle collector

use core_types::{ObjectId, Value};
use memory_manager::{Heap, ScriptObject};
use proptest::prelude::*;
use std::collections::HashSet;

fn cycle(heap: &mut Heap) -> (ObjectId, ObjectId) {
    let a = heap.register(ScriptObject::plain());
    let b = heap.register(ScriptObject::plain());
    heap.put_member(a, "other", Value::Object(b));
    heap.put_member(b, "other", Value::Object(a));
    (a, b)
}

#[test]
fn test_unreachable_cycle_is_swept() {
    let mut heap = Heap::new();
    let root = heap.register(ScriptObject::plain());
    let (a, b) = cycle(&mut heap);

    // Counts alone cannot free the pair.
    assert_eq!(heap.reclaim(&[root]), 0);
    assert!(heap.contains(a) && heap.contains(b));

    heap.mark_all_garbage();
    heap.unmark_reachable(&[root]);
    assert!(heap.is_marked_garbage(a));
    assert_eq!(heap.sweep(), 2);
    assert!(!heap.contains(a));
    assert!(!heap.contains(b));
    assert!(heap.contains(root));
}

#[test]
fn test_rooted_cycle_survives() {
    let mut heap = Heap::new();
    let (a, b) = cycle(&mut heap);
    let report = heap.collect(&[a]);
    assert_eq!(report.freed_by_sweep, 0);
    assert!(heap.contains(a) && heap.contains(b));
}

#[test]
fn test_cycle_reachable_through_member_survives() {
    let mut heap = Heap::new();
    let global = heap.register(ScriptObject::plain());
    let (a, b) = cycle(&mut heap);
    heap.put_member(global, "keep", Value::Object(b));
    heap.collect(&[global]);
    assert!(heap.contains(a) && heap.contains(b));

    heap.delete_member(global, "keep");
    let report = heap.collect(&[global]);
    assert_eq!(report.freed_by_sweep, 2);
    assert_eq!(report.live, 1);
}

#[test]
fn test_stats_accumulate() {
    let mut heap = Heap::new();
    let global = heap.register(ScriptObject::plain());
    heap.register(ScriptObject::plain());
    cycle(&mut heap);
    heap.collect(&[global]);
    let stats = heap.stats();
    assert_eq!(stats.allocated, 4);
    assert_eq!(stats.freed_by_count, 1);
    assert_eq!(stats.freed_by_sweep, 2);
    assert_eq!(stats.collections, 1);
    assert_eq!(stats.live, 1);
}

#[test]
fn test_stale_handle_after_sweep() {
    let mut heap = Heap::new();
    let (a, _) = cycle(&mut heap);
    heap.collect(&[]);
    let reused = heap.register(ScriptObject::plain());
    assert!(heap.get(a).is_none());
    assert!(heap.contains(reused));
}

proptest! {
    /// After a collection exactly the objects reachable from the root remain.
    #[test]
    fn prop_collect_keeps_exactly_reachable(
        edges in prop::collection::vec((0usize..12, 0usize..12), 0..40)
    ) {
        let mut heap = Heap::new();
        let ids: Vec<ObjectId> = (0..12).map(|_| heap.register(ScriptObject::plain())).collect();
        for (i, (from, to)) in edges.iter().enumerate() {
            heap.put_member(ids[*from], &format!("e{}", i), Value::Object(ids[*to]));
        }

        let mut reachable = HashSet::new();
        let mut work = vec![0usize];
        while let Some(n) = work.pop() {
            if reachable.insert(n) {
                work.extend(edges.iter().filter(|(f, _)| *f == n).map(|(_, t)| *t));
            }
        }

        heap.collect(&[ids[0]]);
        for (n, id) in ids.iter().enumerate() {
            prop_assert_eq!(heap.contains(*id), reachable.contains(&n));
        }
    }
}
