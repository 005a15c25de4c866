//! Script interpretation errors.
//!
//! Parse failures of whole code units have their own error types next to
//! their loaders. This module covers what can go wrong while code runs: the
//! interpreter logs these and abandons only the offending buffer or method.

use crate::{CodeLocation, Value};
use thiserror::Error;

/// The kind of interpretation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// Opcode not implemented by this interpreter
    #[error("unimplemented opcode 0x{0:02X}")]
    UnimplementedOpcode(u8),
    /// Truncated or inconsistent instruction stream
    #[error("malformed code")]
    MalformedCode,
    /// Pop from an empty operand or scope stack
    #[error("stack underflow")]
    StackUnderflow,
    /// Call or construct on a value that is not callable
    #[error("not a function")]
    NotAFunction,
    /// Path or target that does not resolve to an object
    #[error("invalid target")]
    InvalidTarget,
    /// Strict name lookup that found nothing
    #[error("reference error")]
    ReferenceError,
    /// Operation applied to a value of the wrong type
    #[error("type error")]
    TypeError,
    /// Recursion deeper than the configured limit
    #[error("call depth exceeded")]
    CallDepthExceeded,
    /// Value raised by a `throw` instruction
    #[error("uncaught exception")]
    Thrown(Value),
}

/// An interpretation error with its message and optional location.
///
/// # Examples
///
/// ```
/// use core_types::{CodeLocation, ErrorKind, ScriptError};
///
/// let error = ScriptError::new(ErrorKind::NotAFunction, "foo is not callable")
///     .at(CodeLocation::action(4));
///
/// assert_eq!(error.kind, ErrorKind::NotAFunction);
/// assert_eq!(error.to_string(), "not a function: foo is not callable");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Where the error happened, once known
    pub location: Option<CodeLocation>,
}

/// Result alias used throughout the interpreters.
pub type ScriptResult<T> = Result<T, ScriptError>;

impl ScriptError {
    /// Creates an error without a location.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ScriptError {
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// Attaches a location unless one is already set.
    ///
    /// Errors bubble out of nested calls; the innermost location is the
    /// useful one, so later calls do not overwrite it.
    pub fn at(mut self, location: CodeLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    /// Pop from an empty stack.
    pub fn stack_underflow() -> Self {
        Self::new(ErrorKind::StackUnderflow, "operand stack is empty")
    }

    /// Truncated or inconsistent code.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedCode, message)
    }

    /// A script-level exception carrying `value`.
    pub fn thrown(value: Value) -> Self {
        Self::new(ErrorKind::Thrown(value), "thrown by script")
    }

    /// The thrown value, if this error is a script exception.
    pub fn thrown_value(&self) -> Option<&Value> {
        match &self.kind {
            ErrorKind::Thrown(value) => Some(value),
            _ => None,
        }
    }
}
