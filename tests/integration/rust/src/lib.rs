//! Integration test suite for the Tessera runtime
//!
//! Tests here drive the player across crate boundaries: bytecode loading,
//! both interpreters, the heap and the display collaborator.

pub mod abc_builder;

pub use abc_builder::{AbcBuilder, Code, ExceptionSpec, TraitSpec};

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
}

use interpreter::{Player, PlayerConfig, RecordingLogSink};

/// A player with a root clip and a recording sink.
pub fn recording_player(config: PlayerConfig) -> (Player, RecordingLogSink) {
    let sink = RecordingLogSink::new();
    let mut player = Player::new(config).with_log_sink(sink.clone());
    player.create_instance();
    (player, sink)
}
