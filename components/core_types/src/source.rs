//! Code locations for error reporting.

use std::fmt;

/// A position inside executable code.
///
/// Legacy action buffers have no method index; ABC code is addressed by the
/// method whose body is running.
///
/// # Examples
///
/// ```
/// use core_types::CodeLocation;
///
/// let loc = CodeLocation::action(0x12);
/// assert_eq!(loc.to_string(), "action@0x0012");
///
/// let loc = CodeLocation::method(3, 7);
/// assert_eq!(loc.to_string(), "method#3@0x0007");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLocation {
    /// Method index in the ABC file, if any
    pub method: Option<u32>,
    /// Byte offset of the instruction
    pub offset: usize,
}

impl CodeLocation {
    /// A location inside an action buffer.
    pub fn action(offset: usize) -> Self {
        CodeLocation {
            method: None,
            offset,
        }
    }

    /// A location inside an ABC method body.
    pub fn method(method: u32, offset: usize) -> Self {
        CodeLocation {
            method: Some(method),
            offset,
        }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method {
            Some(m) => write!(f, "method#{}@0x{:04X}", m, self.offset),
            None => write!(f, "action@0x{:04X}", self.offset),
        }
    }
}
