//! Command line arguments

use crate::error::{CliError, CliResult};
use crate::logging::LogFormat;
use clap::{Parser, ValueEnum};
use interpreter::PlayerConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// First four bytes of an ABC file: minor version 16, major version 46.
const ABC_MAGIC: [u8; 4] = [0x10, 0x00, 0x2E, 0x00];

/// How to interpret the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// ABC by header or `.abc` extension, otherwise an action block
    Auto,
    /// A single AVM1 action block, run as the only root frame
    Actions,
    /// An ABC file
    Abc,
}

impl InputFormat {
    /// Settles `Auto` by looking at the data and file name.
    pub fn resolve(self, data: &[u8], path: Option<&Path>) -> InputFormat {
        match self {
            InputFormat::Auto => {
                let by_name = path
                    .and_then(|p| p.extension())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("abc"));
                if by_name || data.starts_with(&ABC_MAGIC) {
                    InputFormat::Abc
                } else {
                    InputFormat::Actions
                }
            }
            explicit => explicit,
        }
    }
}

/// Tessera - runs AVM1 action blocks and ABC files
#[derive(Debug, Parser)]
#[command(name = "tessera", version)]
pub struct Cli {
    /// File to run
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Input format
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,

    /// JSON player config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Script format version, overriding the config
    #[arg(long)]
    pub script_version: Option<u8>,

    /// Frame rate, overriding the config
    #[arg(long)]
    pub frame_rate: Option<f64>,

    /// Frames to advance after loading
    #[arg(long, default_value_t = 0)]
    pub frames: u32,

    /// Variable paths to print after the run
    #[arg(short, long = "dump")]
    pub dump: Vec<String>,

    /// Print decoded instructions instead of running
    #[arg(long)]
    pub disassemble: bool,

    /// Log every executed instruction at trace level
    #[arg(long)]
    pub verbose_actions: bool,

    /// Print heap statistics after the run
    #[arg(long)]
    pub stats: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Cli {
    /// The config file (or defaults) with command line overrides applied.
    pub fn player_config(&self) -> CliResult<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => PlayerConfig::default(),
        };
        if let Some(version) = self.script_version {
            config = config.with_version(version);
        }
        if let Some(rate) = self.frame_rate {
            config = config.with_frame_rate(rate);
        }
        if self.verbose_actions {
            config = config.with_verbose_actions(true);
        }
        Ok(config)
    }
}

/// Reads a JSON player config. Missing fields take their defaults.
pub fn load_config(path: &Path) -> CliResult<PlayerConfig> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}
