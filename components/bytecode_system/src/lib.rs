//! Bytecode decoding for both script machines.
//!
//! This crate turns raw bytes into typed instructions. It does not execute
//! anything.
//!
//! # Overview
//!
//! - [`ActionBuffer`]: tag-encoded AVM1 action records, decoded one record
//!   at a time at any offset
//! - [`AbcFile`]: a parsed and fully validated ABC (AVM2) block
//! - [`Op`]: AVM2 instructions decoded from a method body
//! - [`ByteReader`]: the little-endian primitive reader both decoders share
//!
//! # Examples
//!
//! ```
//! use bytecode_system::{Action, ActionBuffer, PushValue};
//!
//! // push "x", 12 ; setvariable
//! let buffer = ActionBuffer::new(vec![
//!     0x96, 0x08, 0x00, 0x00, b'x', 0x00, 0x07, 12, 0, 0, 0, 0x1D,
//! ]);
//! let listing = buffer.disassemble().unwrap();
//! assert_eq!(
//!     listing[0].1,
//!     Action::Push(vec![PushValue::Str("x".into()), PushValue::Int(12)])
//! );
//! assert_eq!(listing[1], (11, Action::SetVariable));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod abc;
pub mod abc_parser;
pub mod action;
pub mod op;
pub mod reader;

pub use abc::{
    AbcFile, ClassInfo, ConstantKind, ConstantPool, ConstantValue, ExceptionInfo, InstanceInfo,
    Metadata, MethodBody, MethodFlags, MethodInfo, Multiname, Namespace, NamespaceKind,
    ScriptInfo, Trait, TraitKind,
};
pub use abc_parser::{AbcError, ABC_MAJOR_VERSION, MAX_FRAME_SLOTS, MAX_SLOT_ID};
pub use action::{
    Action, ActionBuffer, ActionError, FunctionDef, FunctionFlags, FunctionParam, PushValue,
};
pub use op::{Condition, Op, OpError};
pub use reader::{ByteReader, ReadError, ReadResult};
