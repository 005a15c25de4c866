//! Core script value types and error handling.
//!
//! This crate provides the foundational types shared by both bytecode
//! machines: the tagged [`Value`], the coercion rules between its variants,
//! the number formatting used when numbers become strings, and the error
//! taxonomy used by the interpreters.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of script values
//! - [`ObjectId`] - Generation-checked handle into the object heap
//! - [`ScriptVersion`] - Per-document format version driving legacy coercions
//! - [`ScriptError`] - Interpretation errors with an [`ErrorKind`]
//! - [`CodeLocation`] - Where in a buffer or method an error occurred
//!
//! # Examples
//!
//! ```
//! use core_types::{ScriptVersion, Value};
//!
//! let n = Value::from("12.5");
//! assert_eq!(n.to_number(), 12.5);
//!
//! // Undefined stringifies differently in legacy documents.
//! assert_eq!(Value::Undefined.to_string_versioned(ScriptVersion::new(6)), "");
//! assert_eq!(Value::Undefined.to_string_versioned(ScriptVersion::new(7)), "undefined");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod number;
mod source;
mod value;
mod version;

pub use error::{ErrorKind, ScriptError, ScriptResult};
pub use number::{format_number, parse_number, to_int32, to_uint32};
pub use source::CodeLocation;
pub use value::{ObjectId, PropertyAccessor, Value};
pub use version::ScriptVersion;
