//! Contract tests for interpreter API
//!
//! These tests pin the host-facing surface: construction, configuration,
//! error reporting and the shapes of collaborator data.

use core_types::Value;
use interpreter::{
    EventId, Player, PlayerConfig, PlayerError, RecordingLogSink, SinkEvent, StandardProperty,
};

/// create_instance hands back the same root every time
#[test]
fn test_create_instance_is_idempotent() {
    let mut player = Player::new(PlayerConfig::default());
    assert!(player.root().is_none());
    let first = player.create_instance();
    let second = player.create_instance();
    assert_eq!(first, second);
    assert_eq!(player.root(), Some(first));
}

/// Host calls before create_instance report NoInstance
#[test]
fn test_calls_without_instance_fail() {
    let mut player = Player::new(PlayerConfig::default());
    assert!(matches!(player.run_actions(&[0x00]), Err(PlayerError::NoInstance)));
    assert!(matches!(
        player.set_variable("x", Value::Null),
        Err(PlayerError::NoInstance)
    ));
    assert!(matches!(
        player.load_action_frames(vec![vec![0x00]]),
        Err(PlayerError::NoInstance)
    ));
}

/// Missing variables read as undefined, not as errors
#[test]
fn test_missing_variable_is_undefined() {
    let mut player = Player::new(PlayerConfig::default());
    player.create_instance();
    assert_eq!(player.get_variable("nothing").unwrap(), Value::Undefined);
    assert_eq!(player.get_variable("a.b.c").unwrap(), Value::Undefined);
}

/// Host values written by path read back unchanged
#[test]
fn test_set_variable_by_path() {
    let mut player = Player::new(PlayerConfig::default());
    player.create_instance();
    player.set_variable("level", Value::Number(3.0)).unwrap();
    player.set_variable("_root.name", Value::from("hero")).unwrap();
    assert_eq!(player.get_variable("level").unwrap(), Value::Number(3.0));
    assert_eq!(player.get_variable("name").unwrap(), Value::from("hero"));
    assert_eq!(player.get_variable("/:level").unwrap(), Value::Number(3.0));
}

/// call_method on something that is not an object names the path
#[test]
fn test_call_method_on_primitive_is_not_found() {
    let mut player = Player::new(PlayerConfig::default());
    player.create_instance();
    player.set_variable("n", Value::Number(1.0)).unwrap();
    match player.call_method("n", "toString", &[]) {
        Err(PlayerError::NotFound(path)) => assert_eq!(path, "n"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

/// A garbage ABC block is rejected by the loader
#[test]
fn test_load_abc_rejects_garbage() {
    let mut player = Player::new(PlayerConfig::default());
    player.create_instance();
    let error = player.load_abc(&[0xFF, 0xFF]).unwrap_err();
    assert!(matches!(error, PlayerError::Abc(_)));
    assert!(error.to_string().starts_with("abc load failed"));
}

/// Config files may omit any field
#[test]
fn test_config_deserializes_with_defaults() {
    let config: PlayerConfig =
        serde_json::from_str(r#"{ "version": 6, "frame_rate": 24.0 }"#).unwrap();
    assert_eq!(config.version, 6);
    assert_eq!(config.frame_rate, 24.0);
    assert_eq!(config.max_call_depth, PlayerConfig::default().max_call_depth);
    assert!((config.frame_interval() - 1.0 / 24.0).abs() < 1e-12);
}

/// Non-positive frame rates fall back to 12 fps
#[test]
fn test_frame_interval_fallback() {
    let config = PlayerConfig::default().with_frame_rate(0.0);
    assert!((config.frame_interval() - 1.0 / 12.0).abs() < 1e-12);
}

/// Event method names map both ways, ignoring case
#[test]
fn test_event_method_names() {
    for event in EventId::ALL {
        assert_eq!(EventId::from_method_name(event.method_name()), Some(event));
    }
    assert_eq!(
        EventId::from_method_name("ONENTERFRAME"),
        Some(EventId::EnterFrame)
    );
    assert_eq!(EventId::from_method_name("onNothing"), None);
}

/// Property indexes follow the fixed table order
#[test]
fn test_standard_property_table() {
    assert_eq!(StandardProperty::from_index(0), Some(StandardProperty::X));
    assert_eq!(StandardProperty::from_index(13), Some(StandardProperty::Name));
    assert_eq!(StandardProperty::from_index(22), None);
    assert!(StandardProperty::TotalFrames.is_read_only());
    assert!(!StandardProperty::Alpha.is_read_only());
}

/// Clones of a recording sink share one record
#[test]
fn test_recording_sink_shared_and_clearable() {
    let sink = RecordingLogSink::new();
    let mut player = Player::new(PlayerConfig::default()).with_log_sink(sink.clone());
    player.create_instance();
    player
        .call_method("_global", "trace", &[Value::from("x")])
        .unwrap();
    assert_eq!(sink.events(), vec![SinkEvent::Trace("x".to_string())]);
    sink.clear();
    assert!(sink.events().is_empty());
}
