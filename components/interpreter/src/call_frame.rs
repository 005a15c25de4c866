//! Call frame for call stack bookkeeping

use core_types::{CodeLocation, ObjectId};

/// Which machine runs a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Host function from the native registry
    Native,
    /// AVM1 function body
    Action,
    /// AVM2 method body
    Abc,
}

/// Call frame representing a function invocation
///
/// The interpreters recurse on the host stack; frames only record what is
/// running, for the depth limit and for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    /// Function object being called
    pub callee: ObjectId,
    /// Machine running the body
    pub kind: FrameKind,
    /// Name for diagnostics
    pub name: String,
    /// Where the body starts
    pub entry: CodeLocation,
}

impl CallFrame {
    /// Create a new call frame
    pub fn new(callee: ObjectId, kind: FrameKind, name: impl Into<String>, entry: CodeLocation) -> Self {
        Self {
            callee,
            kind,
            name: name.into(),
            entry,
        }
    }
}
