//! Tessera command line player
//!
//! Runs a raw AVM1 action block or an ABC file through the player and
//! prints what the scripts trace.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod logging;
pub mod runtime;

pub use cli::{Cli, InputFormat};
pub use error::{CliError, CliResult};
pub use logging::LogFormat;
pub use runtime::{disassemble, Runner};
