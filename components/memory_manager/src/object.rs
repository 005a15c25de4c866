//! Script object representation.
//!
//! A [`ScriptObject`] is a case-insensitive, insertion-ordered member map
//! plus a prototype link and a [`ObjectKind`] payload for the built-in
//! kinds (arrays, boxed primitives, functions, clips, classes). Objects never
//! own each other: every reference is an [`ObjectId`] into the
//! [`Heap`](crate::Heap), which keeps reference counts.

use bytecode_system::{AbcFile, ActionBuffer, FunctionDef};
use core_types::{ObjectId, Value};
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Member attribute bits.
///
/// # Examples
///
/// ```
/// use memory_manager::PropFlags;
///
/// let flags = PropFlags::DONT_ENUM | PropFlags::READ_ONLY;
/// assert!(!flags.is_enumerable());
/// assert!(flags.is_read_only());
/// assert!(flags.is_deletable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PropFlags(u8);

impl PropFlags {
    /// No attributes
    pub const NONE: PropFlags = PropFlags(0);
    /// Hidden from enumeration
    pub const DONT_ENUM: PropFlags = PropFlags(0x01);
    /// Cannot be deleted
    pub const DONT_DELETE: PropFlags = PropFlags(0x02);
    /// Cannot be overwritten by scripts
    pub const READ_ONLY: PropFlags = PropFlags(0x04);
    /// Every defined bit
    pub const ALL: PropFlags = PropFlags(0x07);

    /// Builds flags from raw script bits, dropping undefined ones.
    pub const fn from_bits(bits: u32) -> Self {
        PropFlags((bits & 0x07) as u8)
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(self, other: PropFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Visible to `for..in`.
    pub const fn is_enumerable(self) -> bool {
        !self.contains(Self::DONT_ENUM)
    }

    /// Removable with `delete`.
    pub const fn is_deletable(self) -> bool {
        !self.contains(Self::DONT_DELETE)
    }

    /// Rejects script writes.
    pub const fn is_read_only(self) -> bool {
        self.contains(Self::READ_ONLY)
    }

    /// Clears `clear`, then sets `set`.
    pub const fn apply(self, set: PropFlags, clear: PropFlags) -> PropFlags {
        PropFlags((self.0 & !clear.0) | set.0)
    }
}

impl std::ops::BitOr for PropFlags {
    type Output = PropFlags;

    fn bitor(self, rhs: PropFlags) -> PropFlags {
        PropFlags(self.0 | rhs.0)
    }
}

/// Folds a member name to its lookup key.
pub fn fold_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// A named member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Name as first written
    pub name: String,
    /// Stored value (a `Property` value for accessors)
    pub value: Value,
    /// Attributes
    pub flags: PropFlags,
}

/// A `watch()` registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Watch {
    /// Function called with `(name, old, new, user_data)`
    pub callback: ObjectId,
    /// Extra argument passed through
    pub user_data: Value,
}

/// Index into the runtime's native function registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(pub u32);

/// A function defined by an AVM1 `DefineFunction` record.
#[derive(Debug, Clone)]
pub struct ActionFunction {
    /// Buffer containing the body
    pub buffer: ActionBuffer,
    /// Offset of the first body byte
    pub start: usize,
    /// Header: name, parameters, flags
    pub def: FunctionDef,
    /// Constant pool in effect at definition time
    pub constants: Arc<[String]>,
    /// Script version of the defining document
    pub version: u8,
}

/// What happens when a function object is called.
#[derive(Debug, Clone)]
pub enum Callable {
    /// Host function from the native registry
    Native(NativeId),
    /// AVM1 closure
    Action {
        /// Shared code
        code: Arc<ActionFunction>,
        /// Captured scope chain, outermost first
        scope: Vec<ObjectId>,
        /// Clip that was the target at definition time
        target: Option<ObjectId>,
    },
    /// AVM2 method closure
    Abc {
        /// Owning ABC file
        abc: Arc<AbcFile>,
        /// Method index
        method: u32,
        /// Captured scope stack, outermost first
        scope: Vec<ObjectId>,
        /// Receiver bound for extracted methods
        bound_this: Option<ObjectId>,
        /// Class whose trait defined the method
        class: Option<ObjectId>,
    },
}

/// An AVM2 class object's payload.
#[derive(Debug, Clone)]
pub struct ClassObject {
    /// Owning ABC file
    pub abc: Arc<AbcFile>,
    /// Index into `instances`/`classes`
    pub class_index: usize,
    /// Superclass object, if any
    pub super_class: Option<ObjectId>,
    /// Scope stack at `newclass` time, outermost first
    pub scope: Vec<ObjectId>,
}

/// Capability trait for host-defined object kinds (sound, sockets).
pub trait HostObject: fmt::Debug + Send {
    /// Class name used for builtin method lookup and `toString`.
    fn class_name(&self) -> &str;

    /// Heap references held by the host state.
    fn references(&self, _out: &mut Vec<ObjectId>) {}

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Built-in object kinds.
#[derive(Debug, Default)]
pub enum ObjectKind {
    /// Ordinary object
    #[default]
    Plain,
    /// Dense array; elements live outside the member map
    Array(Vec<Value>),
    /// Wrapped primitive (`new String("x")`)
    Boxed(Value),
    /// Callable object
    Function(Callable),
    /// Display clip; state lives with the display collaborator
    Clip,
    /// Function activation (locals)
    Activation,
    /// AVM2 class object
    Class(ClassObject),
    /// Host extension
    Host(Box<dyn HostObject>),
}

impl ObjectKind {
    /// Class name for builtin-table lookup.
    pub fn class_name(&self) -> &str {
        match self {
            ObjectKind::Plain | ObjectKind::Activation => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Boxed(Value::String(_)) => "String",
            ObjectKind::Boxed(Value::Number(_)) => "Number",
            ObjectKind::Boxed(Value::Boolean(_)) => "Boolean",
            ObjectKind::Boxed(_) => "Object",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Clip => "MovieClip",
            ObjectKind::Class(_) => "Class",
            ObjectKind::Host(host) => host.class_name(),
        }
    }
}

/// A heap object.
///
/// # Examples
///
/// ```
/// use memory_manager::{PropFlags, ScriptObject};
/// use core_types::Value;
///
/// let mut obj = ScriptObject::plain();
/// obj.define("Width", Value::Number(3.0), PropFlags::NONE);
/// assert_eq!(obj.own("width").map(|m| m.value.clone()), Some(Value::Number(3.0)));
/// assert_eq!(obj.own("WIDTH").map(|m| m.name.as_str()), Some("Width"));
/// ```
#[derive(Debug, Default)]
pub struct ScriptObject {
    /// Kind payload
    pub kind: ObjectKind,
    members: IndexMap<String, Member>,
    /// Prototype link (lookup only)
    pub proto: Option<ObjectId>,
    /// Receiver used instead of this object when its methods are called
    pub this_override: Option<ObjectId>,
    watches: IndexMap<String, Watch>,
    /// Member names by AVM2 slot id (slot 1 at index 0)
    pub slot_names: Vec<String>,
}

impl ScriptObject {
    /// Creates an object of `kind` with no prototype.
    pub fn new(kind: ObjectKind) -> Self {
        ScriptObject {
            kind,
            ..Default::default()
        }
    }

    /// Plain object.
    pub fn plain() -> Self {
        Self::new(ObjectKind::Plain)
    }

    /// Object of `kind` inheriting from `proto`.
    pub fn with_proto(kind: ObjectKind, proto: Option<ObjectId>) -> Self {
        ScriptObject {
            kind,
            proto,
            ..Default::default()
        }
    }

    /// Class name for builtin-table lookup.
    pub fn class_name(&self) -> &str {
        self.kind.class_name()
    }

    /// Own member by name.
    pub fn own(&self, name: &str) -> Option<&Member> {
        self.members.get(&fold_key(name))
    }

    pub(crate) fn own_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members.get_mut(&fold_key(name))
    }

    /// True if `name` is an own member (array elements included).
    pub fn has_own(&self, name: &str) -> bool {
        if let ObjectKind::Array(elements) = &self.kind {
            if name.eq_ignore_ascii_case("length") {
                return true;
            }
            if let Some(index) = array_index(name) {
                return index < elements.len();
            }
        }
        self.members.contains_key(&fold_key(name))
    }

    /// Inserts or overwrites a member, ignoring flags, and returns the
    /// value it replaced.
    ///
    /// Only for objects not yet in the heap; live objects go through
    /// [`Heap::define_member`](crate::Heap::define_member) so counts stay
    /// right.
    pub fn define(&mut self, name: &str, value: Value, flags: PropFlags) -> Option<Value> {
        let key = fold_key(name);
        match self.members.get_mut(&key) {
            Some(member) => {
                member.flags = flags;
                Some(std::mem::replace(&mut member.value, value))
            }
            None => {
                self.members.insert(
                    key,
                    Member {
                        name: name.to_string(),
                        value,
                        flags,
                    },
                );
                None
            }
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Member> {
        self.members.shift_remove(&fold_key(name))
    }

    /// Own members in insertion order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub(crate) fn members_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.values_mut()
    }

    /// Names visible to enumeration: array indices, then enumerable members.
    pub fn enumerable_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let ObjectKind::Array(elements) = &self.kind {
            names.extend((0..elements.len()).map(|i| i.to_string()));
        }
        names.extend(
            self.members
                .values()
                .filter(|m| m.flags.is_enumerable())
                .map(|m| m.name.clone()),
        );
        names
    }

    /// Registered watch for `name`.
    pub fn watch(&self, name: &str) -> Option<&Watch> {
        self.watches.get(&fold_key(name))
    }

    pub(crate) fn set_watch(&mut self, name: &str, watch: Watch) -> Option<Watch> {
        self.watches.insert(fold_key(name), watch)
    }

    pub(crate) fn remove_watch(&mut self, name: &str) -> Option<Watch> {
        self.watches.shift_remove(&fold_key(name))
    }

    /// The callable payload, if this is a function.
    pub fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            ObjectKind::Function(callable) => Some(callable),
            _ => None,
        }
    }

    /// Array elements, if this is an array.
    pub fn elements(&self) -> Option<&[Value]> {
        match &self.kind {
            ObjectKind::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Calls `f` for every heap reference this object holds.
    pub fn for_each_reference(&self, mut f: impl FnMut(ObjectId)) {
        let visit_value = |value: &Value, f: &mut dyn FnMut(ObjectId)| match value {
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
        };

        for member in self.members.values() {
            visit_value(&member.value, &mut f);
        }
        for watch in self.watches.values() {
            f(watch.callback);
            visit_value(&watch.user_data, &mut f);
        }
        if let Some(id) = self.proto {
            f(id);
        }
        if let Some(id) = self.this_override {
            f(id);
        }
        match &self.kind {
            ObjectKind::Array(elements) => {
                for value in elements {
                    visit_value(value, &mut f);
                }
            }
            ObjectKind::Boxed(value) => visit_value(value, &mut f),
            ObjectKind::Function(Callable::Action { scope, target, .. }) => {
                scope.iter().copied().for_each(&mut f);
                if let Some(id) = target {
                    f(*id);
                }
            }
            ObjectKind::Function(Callable::Abc {
                scope,
                bound_this,
                class,
                ..
            }) => {
                scope.iter().copied().for_each(&mut f);
                for id in [bound_this, class].into_iter().flatten() {
                    f(*id);
                }
            }
            ObjectKind::Class(class) => {
                scope_refs(&class.scope, class.super_class, &mut f);
            }
            ObjectKind::Host(host) => {
                let mut out = Vec::new();
                host.references(&mut out);
                out.into_iter().for_each(&mut f);
            }
            ObjectKind::Function(Callable::Native(_))
            | ObjectKind::Plain
            | ObjectKind::Clip
            | ObjectKind::Activation => {}
        }
    }

    /// All references as a list, with repeats.
    pub fn references(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        self.for_each_reference(|id| out.push(id));
        out
    }

    /// Drops every member, watch, link and payload reference, returning the
    /// references that were held.
    pub(crate) fn clear_references(&mut self) -> Vec<ObjectId> {
        let refs = self.references();
        self.members.clear();
        self.watches.clear();
        self.proto = None;
        self.this_override = None;
        self.kind = ObjectKind::Plain;
        refs
    }
}

fn scope_refs(scope: &[ObjectId], extra: Option<ObjectId>, f: &mut impl FnMut(ObjectId)) {
    scope.iter().copied().for_each(&mut *f);
    if let Some(id) = extra {
        f(id);
    }
}

/// Largest dense array length. Higher indices are ordinary named members.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Parses a canonical array index (`"0"`, `"17"`, not `"01"`) below
/// [`MAX_ARRAY_LENGTH`].
pub fn array_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok().filter(|index| *index < MAX_ARRAY_LENGTH)
}
