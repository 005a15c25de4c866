//! Runs one input file through a player
//!
//! The [`Runner`] owns a [`Player`] wired to a recording sink so that
//! everything the scripts trace can be printed, or inspected by tests,
//! once the run is over.

use crate::cli::InputFormat;
use crate::error::{CliError, CliResult};
use bytecode_system::{AbcFile, ActionBuffer, Op};
use interpreter::{Player, PlayerConfig, RecordingLogSink, SinkEvent};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// One player session driven from the command line.
pub struct Runner {
    player: Player,
    sink: RecordingLogSink,
    frames: u32,
}

impl Runner {
    /// A runner with a fresh root clip.
    ///
    /// # Example
    /// ```
    /// use interpreter::PlayerConfig;
    /// use tessera_cli::{InputFormat, Runner};
    ///
    /// // push "hi"; trace; end
    /// let code = [0x96, 0x04, 0x00, 0x00, b'h', b'i', 0x00, 0x26, 0x00];
    /// let mut runner = Runner::new(PlayerConfig::default());
    /// runner.run_bytes(&code, InputFormat::Actions).unwrap();
    /// assert_eq!(runner.take_output(), vec!["hi".to_string()]);
    /// ```
    pub fn new(config: PlayerConfig) -> Self {
        let sink = RecordingLogSink::new();
        let mut player = Player::new(config).with_log_sink(sink.clone());
        player.create_instance();
        Self {
            player,
            sink,
            frames: 0,
        }
    }

    /// Frames to advance after loading
    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    /// The player, for inspection.
    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Reads `path` and runs it.
    pub fn run_file(&mut self, path: &Path, format: InputFormat) -> CliResult<()> {
        let data = fs::read(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let format = format.resolve(&data, Some(path));
        info!(path = %path.display(), ?format, bytes = data.len(), "running file");
        self.run_bytes(&data, format)
    }

    /// Loads `data` in the given format, then advances the configured
    /// number of frames.
    pub fn run_bytes(&mut self, data: &[u8], format: InputFormat) -> CliResult<()> {
        match format.resolve(data, None) {
            InputFormat::Abc => self.player.load_abc(data)?,
            _ => self.player.load_action_frames(vec![data.to_vec()])?,
        }
        let interval = self.player.config().frame_interval();
        for _ in 0..self.frames {
            self.player.advance(interval);
        }
        debug!(frames = self.player.frame_count(), "run finished");
        Ok(())
    }

    /// Trace lines since the last call. FSCommand requests are logged.
    pub fn take_output(&mut self) -> Vec<String> {
        let events = self.sink.events();
        self.sink.clear();
        events
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Trace(line) => Some(line),
                SinkEvent::Command(command, args) => {
                    info!(%command, %args, "fscommand");
                    None
                }
            })
            .collect()
    }

    /// `path = value`, formatted the way `trace` would print it.
    pub fn dump(&mut self, path: &str) -> CliResult<String> {
        let value = self.player.get_variable(path)?;
        let text = self.player.runtime_mut().to_string_value(&value)?;
        Ok(format!("{} = {}", path, text))
    }

    /// One line of heap counters.
    pub fn stats_line(&self) -> String {
        let stats = self.player.runtime().heap().stats();
        format!(
            "frames={} live={} allocated={} freed_by_count={} freed_by_sweep={} collections={}",
            self.player.frame_count(),
            stats.live,
            stats.allocated,
            stats.freed_by_count,
            stats.freed_by_sweep,
            stats.collections
        )
    }
}

/// Decoded instructions of `data`, one per line, prefixed by offset.
///
/// ABC files list every method body under a header naming the method.
pub fn disassemble(data: &[u8], format: InputFormat) -> CliResult<Vec<String>> {
    match format.resolve(data, None) {
        InputFormat::Abc => disassemble_abc(data),
        _ => {
            let buffer = ActionBuffer::new(data.to_vec());
            Ok(buffer
                .disassemble()?
                .into_iter()
                .map(|(pc, action)| format!("{:5}  {}", pc, action))
                .collect())
        }
    }
}

fn disassemble_abc(data: &[u8]) -> CliResult<Vec<String>> {
    let abc = AbcFile::parse(data)?;
    let mut lines = Vec::new();
    for body in &abc.bodies {
        lines.push(format!(
            "method {} {:?} (stack {}, locals {})",
            body.method,
            abc.method_name(body.method),
            body.max_stack,
            body.local_count
        ));
        let mut pc = 0;
        while pc < body.code.len() {
            match Op::decode(&body.code, pc) {
                Ok((op, next)) => {
                    lines.push(format!("{:5}  {:?}", pc, op));
                    pc = next;
                }
                Err(error) => {
                    lines.push(format!("{:5}  <{}>", pc, error));
                    break;
                }
            }
        }
    }
    Ok(lines)
}
