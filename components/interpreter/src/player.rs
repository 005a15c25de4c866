//! Host embedding API.
//!
//! A [`Player`] owns one [`Runtime`] and drives it: it creates the root
//! clip, installs timeline scripts, loads ABC blocks, advances frames at the
//! configured rate, forwards input and exposes variables by path.
//! [`EngineHandle`] wraps a player in the engine mutex for collaborators
//! that post events from another thread.

use std::sync::Arc;

use bytecode_system::{AbcError, AbcFile, ActionBuffer, ActionError};
use core_types::{ObjectId, ScriptError, Value};
use memory_manager::{CollectReport, PropFlags};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

use crate::avm1;
use crate::avm2;
use crate::config::PlayerConfig;
use crate::context::Environment;
use crate::display::{DisplayHost, RenderSink, Stage};
use crate::event::EventId;
use crate::host::{LogSink, TracingLogSink};
use crate::natives;
use crate::runtime::Runtime;

/// Most frames run by one `advance` call, however large the step.
const MAX_CATCH_UP_FRAMES: u32 = 8;

/// Failures reported to the embedding host.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// ABC block rejected by the loader
    #[error("abc load failed: {0}")]
    Abc(#[from] AbcError),
    /// Action block rejected before running
    #[error("action block rejected: {0}")]
    Action(#[from] ActionError),
    /// Script fault surfaced to the host
    #[error("script failed: {0}")]
    Script(#[from] ScriptError),
    /// No root clip yet
    #[error("no movie instance; call create_instance first")]
    NoInstance,
    /// A path named nothing
    #[error("nothing at path {0}")]
    NotFound(String),
}

/// Result type of the host API.
pub type PlayerResult<T> = Result<T, PlayerError>;

/// One running movie.
///
/// # Examples
///
/// ```
/// use interpreter::{Player, PlayerConfig, RecordingLogSink};
/// use core_types::Value;
///
/// let sink = RecordingLogSink::new();
/// let mut player = Player::new(PlayerConfig::default()).with_log_sink(sink.clone());
/// player.create_instance();
///
/// // push "x", 12 ; setvariable
/// let code = [0x96, 0x08, 0x00, 0x00, b'x', 0x00, 0x07, 12, 0, 0, 0, 0x1D];
/// player.run_actions(&code).unwrap();
/// assert_eq!(player.get_variable("x").unwrap(), Value::Number(12.0));
/// ```
#[derive(Debug)]
pub struct Player {
    config: PlayerConfig,
    runtime: Runtime,
    root: Option<ObjectId>,
    accumulated: f64,
    frames_since_collection: u32,
    frame_count: u64,
}

impl Player {
    /// A player logging through `tracing` onto an in-memory stage.
    pub fn new(config: PlayerConfig) -> Self {
        let stage = Stage::new(config.stage_width, config.stage_height);
        Self::with_collaborators(config, Box::new(TracingLogSink), Box::new(stage))
    }

    /// A player with host-supplied collaborators.
    pub fn with_collaborators(
        config: PlayerConfig,
        log: Box<dyn LogSink>,
        display: Box<dyn DisplayHost>,
    ) -> Self {
        let runtime = Runtime::new(&config, log, display);
        Player {
            config,
            runtime,
            root: None,
            accumulated: 0.0,
            frames_since_collection: 0,
            frame_count: 0,
        }
    }

    /// Replaces the log sink.
    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.runtime.set_log_sink(Box::new(sink));
        self
    }

    /// The configuration the player was built with.
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// The runtime, for inspection.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The runtime, for direct manipulation.
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    /// The root clip, once created.
    pub fn root(&self) -> Option<ObjectId> {
        self.root
    }

    /// Frames advanced so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Creates the root clip `_level0`. Calling it again returns the
    /// existing root.
    pub fn create_instance(&mut self) -> ObjectId {
        if let Some(root) = self.root {
            return root;
        }
        let root = self.runtime.new_clip(None, "_level0", 0);
        self.root = Some(root);
        debug!(root = %root, version = self.config.version, "instance created");
        root
    }

    fn require_root(&self) -> Result<ObjectId, PlayerError> {
        self.root.ok_or(PlayerError::NoInstance)
    }

    /// Installs one action block per frame on the root timeline and runs
    /// the first frame's block. Every block is decoded up front; a bad one
    /// rejects the whole timeline.
    pub fn load_action_frames(&mut self, frames: Vec<Vec<u8>>) -> PlayerResult<()> {
        let root = self.require_root()?;
        let buffers = frames
            .into_iter()
            .map(|bytes| {
                let buffer = ActionBuffer::new(bytes);
                buffer.disassemble().map(|_| buffer)
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(frames = buffers.len(), "timeline loaded");
        self.runtime.set_timeline(root, buffers);
        self.runtime.run_frame_actions(root, 0);
        self.runtime.run_pending_frames();
        Ok(())
    }

    /// Runs a one-off action block with the root clip as target.
    pub fn run_actions(&mut self, code: &[u8]) -> PlayerResult<Value> {
        let root = self.require_root()?;
        let buffer = ActionBuffer::new(code.to_vec());
        buffer.disassemble()?;
        let mut env = Environment::new(Some(root), self.runtime.version());
        let result = avm1::run_buffer(&mut self.runtime, &mut env, &buffer);
        self.runtime.run_pending_frames();
        Ok(result?)
    }

    /// Parses an ABC block and runs its entry script.
    pub fn load_abc(&mut self, data: &[u8]) -> PlayerResult<()> {
        let abc = AbcFile::parse(data)?;
        avm2::load_abc(&mut self.runtime, Arc::new(abc))?;
        self.runtime.run_pending_frames();
        Ok(())
    }

    /// Advances the movie clock by `delta_seconds`: fires due intervals,
    /// then runs as many frames as the frame rate allows.
    pub fn advance(&mut self, delta_seconds: f64) {
        if !(delta_seconds.is_finite() && delta_seconds > 0.0) {
            return;
        }
        self.runtime.tick(delta_seconds * 1000.0);
        self.accumulated += delta_seconds;
        let interval = self.config.frame_interval();
        let mut frames = 0;
        while self.accumulated >= interval && frames < MAX_CATCH_UP_FRAMES {
            self.accumulated -= interval;
            self.step_frame();
            frames += 1;
        }
        if frames == MAX_CATCH_UP_FRAMES {
            self.accumulated = self.accumulated.min(interval);
        }
    }

    /// One frame: playheads move, frame scripts run, `onEnterFrame`
    /// handlers fire, then garbage is collected.
    fn step_frame(&mut self) {
        self.frame_count += 1;
        for clip in self.runtime.display_mut().advance() {
            if let Some(frame) = self.runtime.display().current_frame(clip) {
                self.runtime.run_frame_actions(clip, frame);
            }
        }
        for clip in self.runtime.display().clips() {
            if let Err(error) = self.runtime.on_event(clip, EventId::EnterFrame, &[]) {
                warn!(clip = %clip, %error, "onEnterFrame failed");
            }
        }
        self.runtime.run_pending_frames();

        self.frames_since_collection += 1;
        let every = self.config.gc_every_frames;
        if every > 0 && self.frames_since_collection >= every {
            self.frames_since_collection = 0;
            self.runtime.collect_garbage();
        } else {
            self.runtime.reclaim();
        }
    }

    /// Hands the visible clips to `sink`.
    pub fn display(&self, sink: &mut dyn RenderSink) {
        self.runtime.display().render(sink);
    }

    /// Records a key transition and notifies `Key` listeners, then clips.
    pub fn notify_key_event(&mut self, code: u32, down: bool) {
        let keys = &mut self.runtime.keys;
        if let Some(state) = keys.down.get_mut(code as usize) {
            *state = down;
        }
        if down {
            keys.last_code = code;
            keys.last_ascii = if (32..127).contains(&code) { code } else { 0 };
        }
        let event = if down {
            EventId::KeyDown
        } else {
            EventId::KeyUp
        };
        let listeners: Vec<ObjectId> = natives::key_listeners(&self.runtime)
            .iter()
            .filter_map(Value::as_object)
            .collect();
        for target in listeners.into_iter().chain(self.runtime.display().clips()) {
            if let Err(error) = self.runtime.on_event(target, event, &[]) {
                warn!(target = %target, %error, "key handler failed");
            }
        }
        self.runtime.run_pending_frames();
    }

    /// Writes a variable by path (`x`, `a.b.c`, `/clip:var`) relative to
    /// the root clip.
    pub fn set_variable(&mut self, path: &str, value: Value) -> PlayerResult<()> {
        let root = self.require_root()?;
        let mut env = Environment::new(Some(root), self.runtime.version());
        avm1::set_variable(&mut self.runtime, &mut env, path, value)?;
        Ok(())
    }

    /// Reads a variable by path relative to the root clip.
    pub fn get_variable(&mut self, path: &str) -> PlayerResult<Value> {
        let root = self.require_root()?;
        let mut env = Environment::new(Some(root), self.runtime.version());
        Ok(avm1::get_variable(&mut self.runtime, &mut env, path)?)
    }

    /// Calls `method` on the object at `path`.
    pub fn call_method(&mut self, path: &str, method: &str, args: &[Value]) -> PlayerResult<Value> {
        let target = self.get_variable(path)?;
        if target.as_object().is_none() {
            return Err(PlayerError::NotFound(path.to_string()));
        }
        let result = self.runtime.call_method(&target, method, args, None)?;
        self.runtime.run_pending_frames();
        Ok(result)
    }

    /// Runs a full cycle collection now.
    pub fn collect_garbage(&mut self) -> CollectReport {
        self.runtime.collect_garbage()
    }

    /// Delivers an `onStatus` event with `{code, level}` to the object at
    /// `path`. Returns whether a handler ran.
    pub fn post_status(&mut self, path: &str, code: &str, level: &str) -> PlayerResult<bool> {
        let Some(target) = self.get_variable(path)?.as_object() else {
            return Err(PlayerError::NotFound(path.to_string()));
        };
        let info = self.runtime.new_object();
        let heap = self.runtime.heap_mut();
        heap.define_member(info, "code", Value::from(code), PropFlags::NONE);
        heap.define_member(info, "level", Value::from(level), PropFlags::NONE);
        let handled = self
            .runtime
            .on_event(target, EventId::Status, &[Value::Object(info)])?;
        self.runtime.run_pending_frames();
        Ok(handled)
    }

    /// Moves the player behind the engine mutex.
    pub fn into_handle(self) -> EngineHandle {
        EngineHandle(Arc::new(Mutex::new(self)))
    }
}

/// A player shared with collaborators on other threads. Every access to
/// runtime state goes through the lock.
#[derive(Debug, Clone)]
pub struct EngineHandle(Arc<Mutex<Player>>);

impl EngineHandle {
    /// Locks the engine.
    pub fn lock(&self) -> MutexGuard<'_, Player> {
        self.0.lock()
    }

    /// Posts a status event from a collaborator thread.
    pub fn post_status(&self, path: &str, code: &str, level: &str) -> PlayerResult<bool> {
        self.lock().post_status(path, code, level)
    }
}
