//! Player configuration.

use core_types::ScriptVersion;
use serde::{Deserialize, Serialize};

/// Tunables for a [`Player`](crate::Player).
///
/// Every field has a default, so a partial JSON document is valid.
///
/// # Examples
///
/// ```
/// use interpreter::PlayerConfig;
///
/// let config = PlayerConfig::default().with_version(6).with_frame_rate(30.0);
/// assert_eq!(config.script_version().get(), 6);
/// assert_eq!(config.max_call_depth, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Script format version of the document
    pub version: u8,
    /// Frames per second
    pub frame_rate: f64,
    /// Maximum nesting of script calls
    pub max_call_depth: usize,
    /// Run the cycle pass every this many frames (0 disables it)
    pub gc_every_frames: u32,
    /// Log every executed instruction at trace level
    pub verbose_actions: bool,
    /// Stage width in pixels
    pub stage_width: f64,
    /// Stage height in pixels
    pub stage_height: f64,
    /// Seed for `random` and `Math.random`
    pub random_seed: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            version: ScriptVersion::DEFAULT.get(),
            frame_rate: 12.0,
            max_call_depth: 256,
            gc_every_frames: 1,
            verbose_actions: false,
            stage_width: 550.0,
            stage_height: 400.0,
            random_seed: 0x2545_F491,
        }
    }
}

impl PlayerConfig {
    /// Sets the script version.
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Sets the frame rate.
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Sets the call depth limit.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Sets the cycle pass cadence.
    pub fn with_gc_every_frames(mut self, frames: u32) -> Self {
        self.gc_every_frames = frames;
        self
    }

    /// Enables per-instruction tracing.
    pub fn with_verbose_actions(mut self, verbose: bool) -> Self {
        self.verbose_actions = verbose;
        self
    }

    /// Sets the stage size.
    pub fn with_stage_size(mut self, width: f64, height: f64) -> Self {
        self.stage_width = width;
        self.stage_height = height;
        self
    }

    /// Sets the random seed.
    pub fn with_random_seed(mut self, seed: u32) -> Self {
        self.random_seed = seed;
        self
    }

    /// The configured version as a [`ScriptVersion`].
    pub fn script_version(&self) -> ScriptVersion {
        ScriptVersion::new(self.version)
    }

    /// Seconds per frame; non-positive rates fall back to 12 fps.
    pub fn frame_interval(&self) -> f64 {
        if self.frame_rate > 0.0 {
            1.0 / self.frame_rate
        } else {
            1.0 / 12.0
        }
    }
}
