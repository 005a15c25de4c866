//! Object arena with deferred reference counting.
//!
//! Every object lives in a slot addressed by an [`ObjectId`]. A slot's
//! generation is bumped whenever its object is destroyed, so stale handles
//! simply stop resolving.
//!
//! Counts track references held *inside* the heap: members, prototype
//! links, closure scopes, accessors, watches and the builtin table.
//! References held by running code (operand stacks, registers) are not
//! counted; instead they are passed as roots at the frame boundary, which is
//! the only place objects are reclaimed. An object whose count falls to zero
//! is queued and destroyed by [`Heap::reclaim`] unless it is a root; cycles
//! keep their counts above zero and are left to the collector in `gc`.

use crate::builtin::BuiltinTable;
use crate::object::{
    array_index, Callable, ObjectKind, PropFlags, ScriptObject, Watch, MAX_ARRAY_LENGTH,
};
use core_types::{ObjectId, PropertyAccessor, Value};
use std::collections::HashSet;
use tracing::trace;

/// Maximum prototype chain length walked by lookups.
pub const MAX_PROTO_DEPTH: usize = 256;

/// Counters describing heap activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects registered since creation
    pub allocated: u64,
    /// Objects destroyed because their count reached zero
    pub freed_by_count: u64,
    /// Objects destroyed by the cycle collector
    pub freed_by_sweep: u64,
    /// Completed collections
    pub collections: u64,
    /// Objects currently alive
    pub live: usize,
}

/// Result of a member write.
#[derive(Debug, Clone, PartialEq)]
pub enum SetOutcome {
    /// The value was stored
    Stored,
    /// The member is read-only; nothing changed
    Rejected,
    /// The member is an accessor; the caller must run its setter
    InvokeSetter(PropertyAccessor),
}

#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) object: ScriptObject,
    pub(crate) refs: u32,
    pub(crate) garbage: bool,
    in_zero_count: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) entry: Option<Entry>,
}

/// The object registry.
///
/// # Examples
///
/// ```
/// use memory_manager::{Heap, ScriptObject, SetOutcome};
/// use core_types::Value;
///
/// let mut heap = Heap::new();
/// let parent = heap.register(ScriptObject::plain());
/// let child = heap.register(ScriptObject::plain());
/// heap.set_prototype(child, Some(parent));
///
/// heap.put_member(parent, "k", Value::Number(1.0));
/// assert_eq!(heap.lookup(child, "k"), Some(Value::Number(1.0)));
///
/// assert_eq!(heap.put_member(child, "k", Value::Number(2.0)), SetOutcome::Stored);
/// assert_eq!(heap.lookup(child, "k"), Some(Value::Number(2.0)));
/// assert_eq!(heap.lookup(parent, "k"), Some(Value::Number(1.0)));
/// ```
#[derive(Debug, Default)]
pub struct Heap {
    pub(crate) slots: Vec<Slot>,
    free: Vec<u32>,
    zero_count: Vec<ObjectId>,
    pub(crate) builtins: BuiltinTable,
    pub(crate) stats: GcStats,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object to the heap and returns its handle.
    ///
    /// The new object starts with a count of zero; it survives the next
    /// [`reclaim`](Self::reclaim) only if something references it or it is
    /// passed as a root.
    pub fn register(&mut self, object: ScriptObject) -> ObjectId {
        object.for_each_reference(|child| self.retain(child));

        let entry = Entry {
            object,
            refs: 0,
            garbage: false,
            in_zero_count: true,
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                ObjectId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                ObjectId::new(index, 0)
            }
        };
        self.zero_count.push(id);
        self.stats.allocated += 1;
        self.stats.live += 1;
        id
    }

    pub(crate) fn entry(&self, id: ObjectId) -> Option<&Entry> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entry.as_ref()
    }

    pub(crate) fn entry_mut(&mut self, id: ObjectId) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entry.as_mut()
    }

    /// True if `id` refers to a live object.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entry(id).is_some()
    }

    /// Borrows a live object.
    pub fn get(&self, id: ObjectId) -> Option<&ScriptObject> {
        self.entry(id).map(|e| &e.object)
    }

    /// Heap-internal reference count of a live object.
    pub fn ref_count(&self, id: ObjectId) -> Option<u32> {
        self.entry(id).map(|e| e.refs)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.stats.live
    }

    /// True if no object is alive.
    pub fn is_empty(&self) -> bool {
        self.stats.live == 0
    }

    /// Handles of every live object, in slot order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, slot)| ObjectId::new(index as u32, slot.generation))
            .collect()
    }

    /// Activity counters.
    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub(crate) fn retain(&mut self, id: ObjectId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.refs += 1;
        }
    }

    pub(crate) fn release(&mut self, id: ObjectId) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 && !entry.in_zero_count {
            entry.in_zero_count = true;
            self.zero_count.push(id);
        }
    }

    fn retain_value(&mut self, value: &Value) {
        for_each_value_ref(value, |id| self.retain(id));
    }

    fn release_value(&mut self, value: &Value) {
        for_each_value_ref(value, |id| self.release(id));
    }

    // ------------------------------------------------------------------
    // Member access
    // ------------------------------------------------------------------

    /// Own member value, including the virtual `length`, array elements and
    /// `__proto__`.
    pub fn get_own(&self, id: ObjectId, name: &str) -> Option<Value> {
        let object = self.get(id)?;
        if name.eq_ignore_ascii_case("__proto__") {
            return object.proto.map(Value::Object);
        }
        match &object.kind {
            ObjectKind::Array(elements) => {
                if name.eq_ignore_ascii_case("length") {
                    return Some(Value::Number(elements.len() as f64));
                }
                if let Some(index) = array_index(name) {
                    return elements.get(index).cloned();
                }
            }
            ObjectKind::Boxed(Value::String(s)) if name.eq_ignore_ascii_case("length") => {
                return Some(Value::Number(s.encode_utf16().count() as f64));
            }
            _ => {}
        }
        object.own(name).map(|m| m.value.clone())
    }

    /// Member lookup: own members, then the receiver class's builtin
    /// table, then the prototype chain, then the `Object` builtins.
    ///
    /// The result may be a `Property` value; running its getter is up to the
    /// caller.
    pub fn lookup(&self, id: ObjectId, name: &str) -> Option<Value> {
        if let Some(value) = self.get_own(id, name) {
            return Some(value);
        }
        let class = self.get(id)?.class_name();
        if let Some(value) = self.builtins.get(class, name) {
            return Some(value.clone());
        }
        let mut next = self.get(id)?.proto;
        let mut depth = 0;
        while let Some(proto) = next {
            if depth >= MAX_PROTO_DEPTH {
                break;
            }
            if let Some(value) = self.get_own(proto, name) {
                return Some(value);
            }
            next = self.get(proto).and_then(|p| p.proto);
            depth += 1;
        }
        if class != "Object" {
            return self.builtins.get("Object", name).cloned();
        }
        None
    }

    /// Prototype chain starting at `id` itself, bounded by
    /// [`MAX_PROTO_DEPTH`].
    pub fn proto_chain(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut chain = Vec::new();
        let mut next = self.get(id).and_then(|o| o.proto);
        while let Some(proto) = next {
            if chain.len() >= MAX_PROTO_DEPTH || chain.contains(&proto) {
                break;
            }
            chain.push(proto);
            next = self.get(proto).and_then(|o| o.proto);
        }
        chain
    }

    fn inherited_setter(&self, id: ObjectId, name: &str) -> Option<PropertyAccessor> {
        self.proto_chain(id).into_iter().find_map(|proto| {
            match self.get(proto)?.own(name)?.value {
                Value::Property(accessor) => Some(accessor),
                _ => None,
            }
        })
    }

    /// Script write to a member.
    ///
    /// Writing to an accessor (own or inherited) does not store anything
    /// but asks the caller to run the setter. Writing to a read-only member
    /// is rejected. `__proto__` rewires the prototype link.
    pub fn put_member(&mut self, id: ObjectId, name: &str, value: Value) -> SetOutcome {
        if !self.contains(id) {
            return SetOutcome::Rejected;
        }
        if name.eq_ignore_ascii_case("__proto__") {
            self.set_prototype(id, value.as_object());
            return SetOutcome::Stored;
        }
        if let Some(outcome) = self.put_array_member(id, name, &value) {
            return outcome;
        }

        let existing = self
            .get(id)
            .and_then(|o| o.own(name))
            .map(|m| (m.value.clone(), m.flags));
        match existing {
            Some((Value::Property(accessor), _)) => SetOutcome::InvokeSetter(accessor),
            Some((_, flags)) if flags.is_read_only() => SetOutcome::Rejected,
            Some((_, flags)) => {
                self.define_member(id, name, value, flags);
                SetOutcome::Stored
            }
            None => {
                if let Some(accessor) = self.inherited_setter(id, name) {
                    return SetOutcome::InvokeSetter(accessor);
                }
                self.define_member(id, name, value, PropFlags::NONE);
                SetOutcome::Stored
            }
        }
    }

    fn put_array_member(&mut self, id: ObjectId, name: &str, value: &Value) -> Option<SetOutcome> {
        let is_array = matches!(self.get(id)?.kind, ObjectKind::Array(_));
        if !is_array {
            return None;
        }
        if name.eq_ignore_ascii_case("length") {
            let len = value.to_number();
            let len = if len.is_finite() && len >= 0.0 {
                (len as usize).min(MAX_ARRAY_LENGTH)
            } else {
                0
            };
            self.array_set_length(id, len);
            return Some(SetOutcome::Stored);
        }
        let index = array_index(name)?;
        self.array_set(id, index, value.clone());
        Some(SetOutcome::Stored)
    }

    /// Stores a member with explicit flags, bypassing read-only checks.
    ///
    /// Used by natives and trait installation.
    pub fn define_member(&mut self, id: ObjectId, name: &str, value: Value, flags: PropFlags) {
        if !self.contains(id) {
            return;
        }
        self.retain_value(&value);
        let old = self
            .entry_mut(id)
            .and_then(|e| e.object.define(name, value, flags));
        if let Some(old) = old {
            self.release_value(&old);
        }
    }

    /// Deletes an own member unless it is DONT_DELETE. Returns whether a
    /// member was removed.
    pub fn delete_member(&mut self, id: ObjectId, name: &str) -> bool {
        let deletable = match self.get(id).and_then(|o| o.own(name)) {
            Some(member) => member.flags.is_deletable(),
            None => return false,
        };
        if !deletable {
            return false;
        }
        let removed = self.entry_mut(id).and_then(|e| e.object.remove(name));
        match removed {
            Some(member) => {
                self.release_value(&member.value);
                true
            }
            None => false,
        }
    }

    /// Names visible to `for..in`, in insertion order.
    pub fn enumerate(&self, id: ObjectId) -> Vec<String> {
        self.get(id)
            .map(ScriptObject::enumerable_names)
            .unwrap_or_default()
    }

    /// Bulk flag update: for each named member (all members when `names` is
    /// `None`) clear `clear`, then set `set`.
    pub fn set_flags(
        &mut self,
        id: ObjectId,
        names: Option<&[String]>,
        set: PropFlags,
        clear: PropFlags,
    ) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        match names {
            None => {
                for member in entry.object.members_mut() {
                    member.flags = member.flags.apply(set, clear);
                }
            }
            Some(names) => {
                for name in names {
                    if let Some(member) = entry.object.own_mut(name.trim()) {
                        member.flags = member.flags.apply(set, clear);
                    }
                }
            }
        }
    }

    /// Rewires the prototype link.
    pub fn set_prototype(&mut self, id: ObjectId, proto: Option<ObjectId>) {
        if let Some(p) = proto {
            self.retain(p);
        }
        let old = match self.entry_mut(id) {
            Some(entry) => std::mem::replace(&mut entry.object.proto, proto),
            None => {
                if let Some(p) = proto {
                    self.release(p);
                }
                return;
            }
        };
        if let Some(old) = old {
            self.release(old);
        }
    }

    /// Sets the receiver substituted for this object on method calls.
    pub fn set_this_override(&mut self, id: ObjectId, this: Option<ObjectId>) {
        if let Some(t) = this {
            self.retain(t);
        }
        let old = match self.entry_mut(id) {
            Some(entry) => std::mem::replace(&mut entry.object.this_override, this),
            None => {
                if let Some(t) = this {
                    self.release(t);
                }
                return;
            }
        };
        if let Some(old) = old {
            self.release(old);
        }
    }

    /// Registers a watch on `name`, replacing any previous one.
    pub fn set_watch(&mut self, id: ObjectId, name: &str, watch: Watch) {
        if !self.contains(id) {
            return;
        }
        self.retain(watch.callback);
        self.retain_value(&watch.user_data);
        let old = self
            .entry_mut(id)
            .and_then(|e| e.object.set_watch(name, watch));
        if let Some(old) = old {
            self.release(old.callback);
            self.release_value(&old.user_data);
        }
    }

    /// Removes a watch. Returns whether one existed.
    pub fn remove_watch(&mut self, id: ObjectId, name: &str) -> bool {
        let old = self.entry_mut(id).and_then(|e| e.object.remove_watch(name));
        match old {
            Some(old) => {
                self.release(old.callback);
                self.release_value(&old.user_data);
                true
            }
            None => false,
        }
    }

    /// The watch registered on `name`, if any.
    pub fn watch(&self, id: ObjectId, name: &str) -> Option<Watch> {
        self.get(id)?.watch(name).cloned()
    }

    /// Records the member names backing AVM2 slot ids.
    pub fn set_slot_names(&mut self, id: ObjectId, names: Vec<String>) {
        if let Some(entry) = self.entry_mut(id) {
            entry.object.slot_names = names;
        }
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Array elements, if `id` is an array.
    pub fn array_elements(&self, id: ObjectId) -> Option<&[Value]> {
        self.get(id)?.elements()
    }

    /// Appends to an array. Returns the new length.
    pub fn array_push(&mut self, id: ObjectId, value: Value) -> Option<usize> {
        let len = match self.entry_mut(id).map(|e| &mut e.object.kind) {
            Some(ObjectKind::Array(elements)) if elements.len() >= MAX_ARRAY_LENGTH => {
                return Some(elements.len())
            }
            Some(ObjectKind::Array(elements)) => {
                elements.push(value.clone());
                elements.len()
            }
            _ => return None,
        };
        self.retain_value(&value);
        Some(len)
    }

    /// Stores one element, padding with undefined up to `index`.
    ///
    /// Indices at or above [`MAX_ARRAY_LENGTH`] are refused.
    pub fn array_set(&mut self, id: ObjectId, index: usize, value: Value) -> bool {
        if index >= MAX_ARRAY_LENGTH {
            return false;
        }
        let old = match self.entry_mut(id).map(|e| &mut e.object.kind) {
            Some(ObjectKind::Array(elements)) => {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                std::mem::replace(&mut elements[index], value.clone())
            }
            _ => return false,
        };
        self.retain_value(&value);
        self.release_value(&old);
        true
    }

    /// Truncates or pads an array to `len`, capped at [`MAX_ARRAY_LENGTH`].
    pub fn array_set_length(&mut self, id: ObjectId, len: usize) {
        let len = len.min(MAX_ARRAY_LENGTH);
        let removed = match self.entry_mut(id).map(|e| &mut e.object.kind) {
            Some(ObjectKind::Array(elements)) => {
                if len < elements.len() {
                    elements.split_off(len)
                } else {
                    elements.resize(len, Value::Undefined);
                    Vec::new()
                }
            }
            _ => return,
        };
        for value in &removed {
            self.release_value(value);
        }
    }

    /// Runs `f` on an array's elements, fixing up counts for whatever it
    /// adds or removes. Costs a pass over the references before and after,
    /// so single-element writes go through [`Heap::array_set`].
    pub fn array_update<R>(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Option<R> {
        let elements = match &mut self.entry_mut(id)?.object.kind {
            ObjectKind::Array(elements) => elements,
            _ => return None,
        };
        let before = element_refs(elements);
        let result = f(elements);
        if elements.len() > MAX_ARRAY_LENGTH {
            elements.truncate(MAX_ARRAY_LENGTH);
        }
        let after = element_refs(elements);
        for id in after {
            self.retain(id);
        }
        for id in before {
            self.release(id);
        }
        Some(result)
    }

    // ------------------------------------------------------------------
    // Host objects
    // ------------------------------------------------------------------

    /// Downcasts a host object's state.
    ///
    /// Host state must not gain heap references after registration.
    pub fn host_mut<T: 'static>(&mut self, id: ObjectId) -> Option<&mut T> {
        match &mut self.entry_mut(id)?.object.kind {
            ObjectKind::Host(host) => host.as_any_mut().downcast_mut::<T>(),
            _ => None,
        }
    }

    /// Downcasts a host object's state.
    pub fn host<T: 'static>(&self, id: ObjectId) -> Option<&T> {
        match &self.get(id)?.kind {
            ObjectKind::Host(host) => host.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// The callable payload of a function object.
    pub fn callable(&self, id: ObjectId) -> Option<&Callable> {
        self.get(id)?.callable()
    }

    // ------------------------------------------------------------------
    // Builtin table
    // ------------------------------------------------------------------

    /// Installs a shared member for every object of `class`.
    pub fn set_builtin(&mut self, class: &str, name: &str, value: Value) {
        self.retain_value(&value);
        if let Some(old) = self.builtins.insert(class, name, value) {
            self.release_value(&old);
        }
    }

    /// Shared member of `class`.
    pub fn builtin(&self, class: &str, name: &str) -> Option<Value> {
        self.builtins.get(class, name).cloned()
    }

    /// The builtin table.
    pub fn builtins(&self) -> &BuiltinTable {
        &self.builtins
    }

    // ------------------------------------------------------------------
    // Reclamation
    // ------------------------------------------------------------------

    /// Destroys every queued object whose count is still zero and that is
    /// not a root, cascading through whatever it referenced. Returns the
    /// number destroyed.
    pub fn reclaim(&mut self, roots: &[ObjectId]) -> usize {
        let rooted: HashSet<ObjectId> = roots.iter().copied().collect();
        let mut freed = 0;
        while let Some(id) = self.zero_count.pop() {
            let Some(entry) = self.entry_mut(id) else {
                continue;
            };
            entry.in_zero_count = false;
            if entry.refs > 0 || rooted.contains(&id) {
                continue;
            }
            self.destroy(id);
            freed += 1;
        }
        self.stats.freed_by_count += freed as u64;
        if freed > 0 {
            trace!(freed, "reclaimed zero-count objects");
        }
        freed
    }

    fn destroy(&mut self, id: ObjectId) {
        let refs = match self.entry_mut(id) {
            Some(entry) => entry.object.clear_references(),
            None => return,
        };
        for child in refs {
            self.release(child);
        }
        self.remove_slot(id);
    }

    pub(crate) fn remove_slot(&mut self, id: ObjectId) {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return;
        };
        if slot.generation != id.generation() || slot.entry.is_none() {
            return;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.stats.live -= 1;
    }
}

fn element_refs(elements: &[Value]) -> Vec<ObjectId> {
    let mut refs = Vec::new();
    for value in elements {
        for_each_value_ref(value, |id| refs.push(id));
    }
    refs
}

fn for_each_value_ref(value: &Value, mut f: impl FnMut(ObjectId)) {
    match value {
        Value::Object(id) => f(*id),
        Value::Property(accessor) => {
            for id in [accessor.getter, accessor.setter, accessor.target]
                .into_iter()
                .flatten()
            {
                f(id);
            }
        }
        _ => {}
    }
}
