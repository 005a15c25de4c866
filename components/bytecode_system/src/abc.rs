//! In-memory tables of an ABC (ActionScript bytecode) file.
//!
//! All cross references are indices into the tables of the owning
//! [`AbcFile`]. The loader validates every index before handing out a file,
//! so lookups through the accessors here only fail for index 0 where the
//! format reserves it.

use std::fmt;

/// Namespace categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// `0x08` plain namespace
    Namespace,
    /// `0x16` public package namespace
    Package,
    /// `0x17` package-internal namespace
    PackageInternal,
    /// `0x18` protected namespace
    Protected,
    /// `0x19` explicit namespace
    Explicit,
    /// `0x1A` static protected namespace
    StaticProtected,
    /// `0x05` private namespace
    Private,
}

impl NamespaceKind {
    /// Decodes a namespace kind byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x08 => NamespaceKind::Namespace,
            0x16 => NamespaceKind::Package,
            0x17 => NamespaceKind::PackageInternal,
            0x18 => NamespaceKind::Protected,
            0x19 => NamespaceKind::Explicit,
            0x1A => NamespaceKind::StaticProtected,
            0x05 => NamespaceKind::Private,
            _ => return None,
        })
    }
}

/// A namespace entry: kind plus name string index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    /// Category
    pub kind: NamespaceKind,
    /// Index into the string pool
    pub name: u32,
}

/// A reference to a name, possibly resolved at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Multiname {
    /// Index 0: matches any name
    Any,
    /// Namespace-qualified name
    QName {
        /// Namespace pool index
        namespace: u32,
        /// String pool index
        name: u32,
        /// Attribute name (`@x`)
        attribute: bool,
    },
    /// Name with namespace popped from the stack
    RTQName {
        /// String pool index
        name: u32,
        /// Attribute name
        attribute: bool,
    },
    /// Name and namespace popped from the stack
    RTQNameL {
        /// Attribute name
        attribute: bool,
    },
    /// Name searched in a namespace set
    Multiname {
        /// String pool index
        name: u32,
        /// Namespace-set pool index
        ns_set: u32,
        /// Attribute name
        attribute: bool,
    },
    /// Name popped from the stack, searched in a namespace set
    MultinameL {
        /// Namespace-set pool index
        ns_set: u32,
        /// Attribute name
        attribute: bool,
    },
    /// Parameterised type such as `Vector.<int>`
    TypeName {
        /// Multiname of the generic type
        base: u32,
        /// Multinames of the parameters
        params: Vec<u32>,
    },
}

impl Multiname {
    /// True if the name itself is popped from the operand stack.
    pub fn has_runtime_name(&self) -> bool {
        matches!(self, Multiname::RTQNameL { .. } | Multiname::MultinameL { .. })
    }

    /// True if the namespace is popped from the operand stack.
    pub fn has_runtime_namespace(&self) -> bool {
        matches!(self, Multiname::RTQName { .. } | Multiname::RTQNameL { .. })
    }

    /// String pool index of the local name, when it is static.
    pub fn name_index(&self) -> Option<u32> {
        match self {
            Multiname::QName { name, .. }
            | Multiname::RTQName { name, .. }
            | Multiname::Multiname { name, .. } => Some(*name),
            _ => None,
        }
    }
}

/// Kind tag of a constant value reference (default values, slot values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantKind {
    /// `0x00`
    Undefined,
    /// `0x01` string pool
    Utf8,
    /// `0x03` int pool
    Int,
    /// `0x04` uint pool
    UInt,
    /// `0x06` double pool
    Double,
    /// `0x0A`
    False,
    /// `0x0B`
    True,
    /// `0x0C`
    Null,
    /// Namespace kinds; value indexes the namespace pool
    Namespace(NamespaceKind),
}

impl ConstantKind {
    /// Decodes a value kind byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => ConstantKind::Undefined,
            0x01 => ConstantKind::Utf8,
            0x03 => ConstantKind::Int,
            0x04 => ConstantKind::UInt,
            0x06 => ConstantKind::Double,
            0x0A => ConstantKind::False,
            0x0B => ConstantKind::True,
            0x0C => ConstantKind::Null,
            other => ConstantKind::Namespace(NamespaceKind::from_byte(other)?),
        })
    }
}

/// A constant reference: pool selected by kind, entry by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantValue {
    /// Which pool
    pub kind: ConstantKind,
    /// Entry in that pool
    pub index: u32,
}

/// Constant pools. Entry 0 of every pool is the reserved default.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantPool {
    /// Signed integers
    pub ints: Vec<i32>,
    /// Unsigned integers
    pub uints: Vec<u32>,
    /// Doubles
    pub doubles: Vec<f64>,
    /// Strings
    pub strings: Vec<String>,
    /// Namespaces
    pub namespaces: Vec<Namespace>,
    /// Namespace sets (lists of namespace indices)
    pub ns_sets: Vec<Vec<u32>>,
    /// Multinames
    pub multinames: Vec<Multiname>,
}

/// `method_info` flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodFlags(pub u8);

impl MethodFlags {
    /// Uses the `arguments` object
    pub const NEED_ARGUMENTS: u8 = 0x01;
    /// Creates an activation object
    pub const NEED_ACTIVATION: u8 = 0x02;
    /// Collects extra arguments into `rest`
    pub const NEED_REST: u8 = 0x04;
    /// Has optional parameter defaults
    pub const HAS_OPTIONAL: u8 = 0x08;
    /// Sets the default XML namespace
    pub const SET_DXNS: u8 = 0x40;
    /// Carries parameter names
    pub const HAS_PARAM_NAMES: u8 = 0x80;

    /// True if `flag` is set.
    pub fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }
}

/// Signature of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Multiname indices of the parameter types
    pub param_types: Vec<u32>,
    /// Multiname index of the return type
    pub return_type: u32,
    /// String index of the name
    pub name: u32,
    /// Flag bits
    pub flags: MethodFlags,
    /// Defaults for the trailing optional parameters
    pub optional: Vec<ConstantValue>,
    /// String indices of parameter names
    pub param_names: Vec<u32>,
}

/// Metadata entry (parsed, not interpreted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// String index of the tag name
    pub name: u32,
    /// Key/value string index pairs
    pub items: Vec<(u32, u32)>,
}

/// Kind-specific trait data.
#[derive(Debug, Clone, PartialEq)]
pub enum TraitKind {
    /// Variable slot
    Slot {
        /// Slot position, 0 for auto
        slot_id: u32,
        /// Multiname of the type
        type_name: u32,
        /// Initial value
        value: Option<ConstantValue>,
    },
    /// Constant slot
    Const {
        /// Slot position, 0 for auto
        slot_id: u32,
        /// Multiname of the type
        type_name: u32,
        /// Initial value
        value: Option<ConstantValue>,
    },
    /// Nested class definition
    Class {
        /// Slot position
        slot_id: u32,
        /// Class index
        class: u32,
    },
    /// Function stored in a slot
    Function {
        /// Slot position
        slot_id: u32,
        /// Method index
        method: u32,
    },
    /// Method
    Method {
        /// Dispatch id
        disp_id: u32,
        /// Method index
        method: u32,
    },
    /// Getter
    Getter {
        /// Dispatch id
        disp_id: u32,
        /// Method index
        method: u32,
    },
    /// Setter
    Setter {
        /// Dispatch id
        disp_id: u32,
        /// Method index
        method: u32,
    },
}

/// A declared member of a class, instance, script or activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Trait {
    /// Multiname index (always a QName)
    pub name: u32,
    /// Kind-specific data
    pub kind: TraitKind,
    /// `final` attribute
    pub is_final: bool,
    /// `override` attribute
    pub is_override: bool,
    /// Metadata indices
    pub metadata: Vec<u32>,
}

/// Instance half of a class definition.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    /// Multiname of the class
    pub name: u32,
    /// Multiname of the superclass, 0 for none
    pub super_name: u32,
    /// Sealed/final/interface/protected-ns flags
    pub flags: u8,
    /// Protected namespace, if flagged
    pub protected_ns: Option<u32>,
    /// Multinames of implemented interfaces
    pub interfaces: Vec<u32>,
    /// Instance initializer method
    pub init_method: u32,
    /// Instance traits
    pub traits: Vec<Trait>,
}

impl InstanceInfo {
    /// Sealed class flag
    pub const SEALED: u8 = 0x01;
    /// Final class flag
    pub const FINAL: u8 = 0x02;
    /// Interface flag
    pub const INTERFACE: u8 = 0x04;
    /// Has a protected namespace
    pub const PROTECTED_NS: u8 = 0x08;

    /// True for interfaces.
    pub fn is_interface(&self) -> bool {
        self.flags & Self::INTERFACE != 0
    }
}

/// Static half of a class definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    /// Static initializer method
    pub init_method: u32,
    /// Static traits
    pub traits: Vec<Trait>,
}

/// A script: an entry point plus the globals it defines.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInfo {
    /// Script initializer method
    pub init_method: u32,
    /// Traits installed on the global object
    pub traits: Vec<Trait>,
}

/// An exception handler range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Start of the protected range (inclusive)
    pub from: u32,
    /// End of the protected range (exclusive)
    pub to: u32,
    /// Handler offset
    pub target: u32,
    /// Multiname of the caught type, 0 for any
    pub exception_type: u32,
    /// Multiname of the catch variable
    pub var_name: u32,
}

/// Code and frame sizing of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Method index this body belongs to
    pub method: u32,
    /// Maximum operand stack depth
    pub max_stack: u32,
    /// Number of local registers
    pub local_count: u32,
    /// Scope depth on entry
    pub init_scope_depth: u32,
    /// Maximum scope depth
    pub max_scope_depth: u32,
    /// Bytecode
    pub code: Vec<u8>,
    /// Exception ranges
    pub exceptions: Vec<ExceptionInfo>,
    /// Activation traits
    pub traits: Vec<Trait>,
}

/// A fully parsed and validated ABC file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AbcFile {
    /// Minor format version
    pub minor_version: u16,
    /// Major format version
    pub major_version: u16,
    /// Constant pools
    pub constant_pool: ConstantPool,
    /// Method signatures
    pub methods: Vec<MethodInfo>,
    /// Metadata entries
    pub metadata: Vec<Metadata>,
    /// Instance halves, paired 1:1 with `classes`
    pub instances: Vec<InstanceInfo>,
    /// Static halves
    pub classes: Vec<ClassInfo>,
    /// Scripts, the last one is the entry point
    pub scripts: Vec<ScriptInfo>,
    /// Method bodies
    pub bodies: Vec<MethodBody>,
    pub(crate) body_of_method: Vec<Option<usize>>,
}

impl AbcFile {
    /// The body of `method`, if it has one (native and interface methods do not).
    pub fn body_of(&self, method: u32) -> Option<&MethodBody> {
        let index = (*self.body_of_method.get(method as usize)?)?;
        self.bodies.get(index)
    }

    /// String pool entry.
    pub fn string(&self, index: u32) -> Option<&str> {
        self.constant_pool
            .strings
            .get(index as usize)
            .map(String::as_str)
    }

    /// Multiname pool entry.
    pub fn multiname(&self, index: u32) -> Option<&Multiname> {
        self.constant_pool.multinames.get(index as usize)
    }

    /// Local name of a multiname with a static name.
    pub fn multiname_local_name(&self, index: u32) -> Option<&str> {
        self.multiname(index)?
            .name_index()
            .and_then(|name| self.string(name))
    }

    /// Name string of a namespace.
    pub fn namespace_name(&self, index: u32) -> Option<&str> {
        let ns = self.constant_pool.namespaces.get(index as usize)?;
        self.string(ns.name)
    }

    /// Name of a method, for diagnostics.
    pub fn method_name(&self, method: u32) -> &str {
        self.methods
            .get(method as usize)
            .and_then(|m| self.string(m.name))
            .filter(|name| !name.is_empty())
            .unwrap_or("<anonymous>")
    }

    /// Index of the class whose instance name is `name`.
    pub fn class_by_name(&self, name: &str) -> Option<usize> {
        self.instances
            .iter()
            .position(|inst| self.multiname_local_name(inst.name) == Some(name))
    }

    /// Readable rendering of a multiname, for logging.
    pub fn display_multiname(&self, index: u32) -> MultinameDisplay<'_> {
        MultinameDisplay { abc: self, index }
    }
}

/// Formats a multiname as `ns::name`.
pub struct MultinameDisplay<'a> {
    abc: &'a AbcFile,
    index: u32,
}

impl fmt::Display for MultinameDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abc = self.abc;
        match abc.multiname(self.index) {
            None | Some(Multiname::Any) => write!(f, "*"),
            Some(Multiname::QName {
                namespace, name, ..
            }) => {
                let ns = abc.namespace_name(*namespace).unwrap_or("");
                let name = abc.string(*name).unwrap_or("*");
                if ns.is_empty() {
                    write!(f, "{}", name)
                } else {
                    write!(f, "{}::{}", ns, name)
                }
            }
            Some(Multiname::RTQName { name, .. }) => {
                write!(f, "<rt>::{}", abc.string(*name).unwrap_or("*"))
            }
            Some(Multiname::RTQNameL { .. }) => write!(f, "<rt>::<rt>"),
            Some(Multiname::Multiname { name, .. }) => {
                write!(f, "{{...}}::{}", abc.string(*name).unwrap_or("*"))
            }
            Some(Multiname::MultinameL { .. }) => write!(f, "{{...}}::<rt>"),
            Some(Multiname::TypeName { base, params }) => {
                write!(f, "{}.<", abc.display_multiname(*base))?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", abc.display_multiname(*p))?;
                }
                write!(f, ">")
            }
        }
    }
}
