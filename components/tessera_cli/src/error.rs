//! Error types for the CLI

use bytecode_system::{AbcError, ActionError};
use core_types::ScriptError;
use interpreter::PlayerError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Input or config file could not be read
    #[error("could not read '{}': {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid JSON for a player config
    #[error("invalid config '{}': {source}", path.display())]
    Config {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Load or host call failed
    #[error(transparent)]
    Player(#[from] PlayerError),

    /// Action block could not be decoded for disassembly
    #[error("action decode failed: {0}")]
    Action(#[from] ActionError),

    /// ABC file could not be parsed for disassembly
    #[error("abc parse failed: {0}")]
    Abc(#[from] AbcError),

    /// Script fault while formatting a dumped value
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Logging could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
