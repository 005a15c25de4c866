//! Script runtime for Flash documents
//!
//! This crate executes both script generations a document may carry:
//! - AVM1 action blocks attached to timeline frames, clip events and
//!   `DefineFunction` bodies
//! - AVM2 bytecode loaded from ABC blocks, with classes, traits and
//!   exception ranges
//! - A native library (`Object`, `Array`, `String`, `Math`, `Key`,
//!   `MovieClip`, `Sound`, global functions)
//! - A host API ([`Player`]) that advances frames, forwards input and reads
//!   or writes variables by path
//!
//! Objects live in the [`memory_manager`] heap; the player runs the cycle
//! pass between frames only.
//!
//! # Example
//!
//! ```
//! use interpreter::{Player, PlayerConfig, RecordingLogSink};
//!
//! let sink = RecordingLogSink::new();
//! let mut player = Player::new(PlayerConfig::default()).with_log_sink(sink.clone());
//! player.create_instance();
//!
//! // push "hello" ; trace ; end
//! let code = [0x96, 0x07, 0x00, 0x00, b'h', b'e', b'l', b'l', b'o', 0x00, 0x26, 0x00];
//! player.run_actions(&code).unwrap();
//! assert_eq!(sink.lines(), vec!["hello".to_string()]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod avm1;
pub mod avm2;
pub mod call_frame;
pub mod config;
pub mod context;
pub mod display;
pub mod event;
pub mod host;
pub mod natives;
pub mod player;
pub mod runtime;

// Re-export main types at crate root
pub use avm2::Domain;
pub use call_frame::{CallFrame, FrameKind};
pub use config::PlayerConfig;
pub use context::Environment;
pub use display::{DisplayHost, DisplayItem, RenderSink, Stage, StandardProperty};
pub use event::EventId;
pub use host::{LogSink, RecordingLogSink, SinkEvent, TracingLogSink};
pub use natives::{NativeCall, NativeFn, SoundState};
pub use player::{EngineHandle, Player, PlayerError, PlayerResult};
pub use runtime::{Hint, Prototypes, Runtime};
