//! Script value representation.
//!
//! This module provides the [`Value`] enum shared by both bytecode machines
//! together with the primitive coercion rules. Objects are referenced by
//! [`ObjectId`] handles into the heap; coercions that need to look inside an
//! object (calling `toString`, reading a getter) live in the interpreter,
//! which resolves objects to primitives before calling into this module.

use crate::number::{format_number, parse_number, to_int32, to_uint32};
use crate::ScriptVersion;
use std::fmt;

/// Handle to an object in the heap.
///
/// The index addresses a heap slot; the generation is bumped every time a
/// slot is reused, so a handle to a destroyed object never aliases the
/// object that later takes its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Creates a handle from its raw parts.
    pub const fn new(index: u32, generation: u32) -> Self {
        ObjectId { index, generation }
    }

    /// Slot index in the heap.
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this handle was issued.
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Getter/setter pair stored in a property slot.
///
/// Reading the slot calls the getter, writing it calls the setter. When no
/// target is bound the receiver of the member access is used as `this`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropertyAccessor {
    /// Function called on read
    pub getter: Option<ObjectId>,
    /// Function called on write
    pub setter: Option<ObjectId>,
    /// Object bound as `this` for both calls
    pub target: Option<ObjectId>,
}

/// Represents any script value.
///
/// Exactly one variant is active. Strings are owned; objects are shared
/// through heap handles.
///
/// # Examples
///
/// ```
/// use core_types::{ScriptVersion, Value};
///
/// let v8 = ScriptVersion::new(8);
/// assert!(Value::from("0").to_bool(v8));
/// assert!(!Value::from("0").to_bool(ScriptVersion::new(6)));
///
/// assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
/// assert!(Value::Undefined.loose_equals(&Value::Null));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The undefined value
    #[default]
    Undefined,
    /// The null value
    Null,
    /// true or false
    Boolean(bool),
    /// IEEE 754 double-precision number
    Number(f64),
    /// Owned string
    String(String),
    /// Heap object, including functions and clips
    Object(ObjectId),
    /// Accessor slot, only ever stored inside an object's members
    Property(PropertyAccessor),
}

impl Value {
    /// True for `undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for `undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// True for strings.
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// The object handle, if this is an object.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// The string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to a number.
    ///
    /// Unparsable strings yield NaN. Objects have no primitive value at this
    /// level and also yield NaN; callers resolve `valueOf` first.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert_eq!(Value::Boolean(true).to_number(), 1.0);
    /// assert_eq!(Value::Null.to_number(), 0.0);
    /// assert!(Value::from("twelve").to_number().is_nan());
    /// ```
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s).unwrap_or(f64::NAN),
            Value::Object(_) | Value::Property(_) => f64::NAN,
        }
    }

    /// Converts to a number, honouring legacy rules for `undefined`.
    pub fn to_number_versioned(&self, version: ScriptVersion) -> f64 {
        match self {
            Value::Undefined if version.undefined_is_zero() => 0.0,
            _ => self.to_number(),
        }
    }

    /// Converts to a string, honouring legacy rules for `undefined`.
    pub fn to_string_versioned(&self, version: ScriptVersion) -> String {
        match self {
            Value::Undefined if version.undefined_is_empty_string() => String::new(),
            _ => self.to_string(),
        }
    }

    /// Converts to a boolean.
    ///
    /// Strings are version-gated: newer documents test for non-empty, legacy
    /// documents recognise the literals `"true"`/`"false"` and otherwise use
    /// the truthiness of the parsed number.
    pub fn to_bool(&self, version: ScriptVersion) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::Property(_) => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => number_truthiness(*n),
            Value::String(s) => {
                if version.strings_test_non_empty() {
                    !s.is_empty()
                } else if s == "true" {
                    true
                } else if s == "false" {
                    false
                } else {
                    number_truthiness(parse_number(s).unwrap_or(f64::NAN))
                }
            }
            Value::Object(_) => true,
        }
    }

    /// Signed 32-bit integer conversion with wrap-around.
    pub fn to_i32(&self) -> i32 {
        to_int32(self.to_number())
    }

    /// Unsigned 32-bit integer conversion with wrap-around.
    pub fn to_u32(&self) -> u32 {
        to_uint32(self.to_number())
    }

    /// `typeof` for primitives; objects report `"object"`.
    ///
    /// The interpreter refines objects to `"function"` or `"movieclip"`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined | Value::Property(_) => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
        }
    }

    /// Abstract equality.
    ///
    /// `undefined` and `null` form one equivalence class. Otherwise the left
    /// operand's type decides the coercion applied to the right operand.
    /// Objects are equal only to the same object.
    pub fn loose_equals(&self, other: &Value) -> bool {
        if self.is_nullish() || other.is_nullish() {
            return self.is_nullish() == other.is_nullish();
        }
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::String(a), _) if !matches!(other, Value::Object(_)) => *a == other.to_string(),
            (Value::Number(a), _) if !matches!(other, Value::Object(_)) => *a == other.to_number(),
            (Value::Boolean(a), _) if !matches!(other, Value::Object(_)) => {
                *a == other.to_bool(ScriptVersion::DEFAULT)
            }
            _ => false,
        }
    }

    /// Strict equality: same type and same value, NaN unequal to itself.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

fn number_truthiness(n: f64) -> bool {
    n != 0.0 && !n.is_nan()
}

/// String conversion for primitives.
///
/// Numbers use the `%.14g` formatting of [`format_number`]; objects print
/// the default `[object Object]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined | Value::Property(_) => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(_) => write!(f, "[object Object]"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}
