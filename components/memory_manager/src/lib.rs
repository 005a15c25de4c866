//! Object model and heap for the script runtime.
//!
//! # Overview
//!
//! - [`ScriptObject`]: members with [`PropFlags`], prototype link, kind
//!   payload ([`ObjectKind`])
//! - [`Heap`]: slot arena addressed by generation-checked handles, with
//!   heap-internal reference counts and zero-count reclamation
//! - cycle collector: [`Heap::mark_all_garbage`], [`Heap::unmark`],
//!   [`Heap::sweep`] and the combined [`Heap::collect`]
//! - [`BuiltinTable`]: members shared by every object of a class
//!
//! # Examples
//!
//! ```
//! use memory_manager::{Heap, ScriptObject};
//! use core_types::Value;
//!
//! let mut heap = Heap::new();
//! let global = heap.register(ScriptObject::plain());
//! let orphan = heap.register(ScriptObject::plain());
//! heap.put_member(global, "answer", Value::Number(42.0));
//!
//! heap.collect(&[global]);
//! assert!(heap.contains(global));
//! assert!(!heap.contains(orphan));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod builtin;
pub mod gc;
pub mod heap;
pub mod object;

pub use builtin::BuiltinTable;
pub use gc::CollectReport;
pub use heap::{GcStats, Heap, SetOutcome, MAX_PROTO_DEPTH};
pub use object::{
    array_index, fold_key, ActionFunction, Callable, ClassObject, HostObject, Member, NativeId,
    ObjectKind, PropFlags, ScriptObject, Watch, MAX_ARRAY_LENGTH,
};
