//! Integration tests for interpreter
//!
//! Drives whole movies through the player: frames, clip events, input,
//! intervals and collection between frames.

#[path = "../common/asm.rs"]
mod asm;

use std::thread;

use asm::*;
use core_types::Value;
use interpreter::{DisplayItem, Player, PlayerConfig, RecordingLogSink};

const FRAME: f64 = 1.0 / 12.0;

fn player() -> (Player, RecordingLogSink) {
    let sink = RecordingLogSink::new();
    let mut player = Player::new(PlayerConfig::default()).with_log_sink(sink.clone());
    player.create_instance();
    (player, sink)
}

fn increment(name: &str) -> Asm {
    Asm::new().set(name, |a| a.get(name).op(INCREMENT))
}

#[test]
fn test_timeline_loops_frame_scripts() {
    let (mut player, sink) = player();
    let frames = vec![
        Asm::new().push_str("one").op(TRACE).build(),
        Asm::new().push_str("two").op(TRACE).build(),
    ];
    player.load_action_frames(frames).unwrap();
    for _ in 0..3 {
        player.advance(FRAME);
    }
    assert_eq!(sink.lines(), vec!["one", "two", "one", "two"]);
}

#[test]
fn test_stop_then_goto_from_host() {
    let (mut player, sink) = player();
    let frames = vec![
        Asm::new().op(0x07).build(),
        Asm::new().push_str("second").op(TRACE).build(),
    ];
    player.load_action_frames(frames).unwrap();
    player.advance(FRAME * 0.5);
    player.advance(FRAME * 0.5);
    assert!(sink.lines().is_empty());

    player
        .call_method("_root", "gotoAndStop", &[Value::Number(2.0)])
        .unwrap();
    assert_eq!(sink.lines(), vec!["second"]);
}

#[test]
fn test_on_enter_frame_runs_every_frame() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("count", |a| a.push_int(0))
        .set("onEnterFrame", |a| a.function("", &[], increment("count")))
        .build();
    player.run_actions(&code).unwrap();
    for _ in 0..3 {
        player.advance(FRAME);
    }
    assert_eq!(player.get_variable("count").unwrap(), Value::Number(3.0));
    assert_eq!(player.frame_count(), 3);
}

#[test]
fn test_advance_caps_catch_up_frames() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("count", |a| a.push_int(0))
        .set("onEnterFrame", |a| a.function("", &[], increment("count")))
        .build();
    player.run_actions(&code).unwrap();
    player.advance(60.0);
    assert_eq!(player.get_variable("count").unwrap(), Value::Number(8.0));
}

#[test]
fn test_key_listener_sees_key_code() {
    let (mut player, sink) = player();
    let handler = Asm::new()
        .push_int(0)
        .get("Key")
        .push_str("getCode")
        .op(CALL_METHOD)
        .op(TRACE);
    let code = Asm::new()
        .set("listener", |a| a.push_int(0).push_str("Object").op(NEW_OBJECT))
        .get("listener")
        .push_str("onKeyDown")
        .function("", &[], handler)
        .op(SET_MEMBER)
        // Key.addListener(listener)
        .get("listener")
        .push_int(1)
        .get("Key")
        .push_str("addListener")
        .op(CALL_METHOD)
        .op(POP)
        .build();
    player.run_actions(&code).unwrap();

    player.notify_key_event(65, true);
    assert_eq!(sink.lines(), vec!["65"]);
    assert_eq!(
        player
            .call_method("Key", "isDown", &[Value::Number(65.0)])
            .unwrap(),
        Value::Boolean(true)
    );

    player.notify_key_event(65, false);
    assert_eq!(
        player
            .call_method("Key", "isDown", &[Value::Number(65.0)])
            .unwrap(),
        Value::Boolean(false)
    );
}

#[test]
fn test_interval_fires_with_clock() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("ticks", |a| a.push_int(0))
        .set("id", |a| {
            a.push_int(100)
                .function("", &[], increment("ticks"))
                .push_int(2)
                .push_str("setInterval")
                .op(CALL_FUNCTION)
        })
        .build();
    player.run_actions(&code).unwrap();
    player.advance(0.25);
    assert_eq!(player.get_variable("ticks").unwrap(), Value::Number(2.0));

    let id = player.get_variable("id").unwrap();
    player.call_method("_global", "clearInterval", &[id]).unwrap();
    player.advance(0.5);
    assert_eq!(player.get_variable("ticks").unwrap(), Value::Number(2.0));
}

#[test]
fn test_cycle_collected_between_frames() {
    let (mut player, _) = player();
    let new_object = |a: Asm| a.push_int(0).push_str("Object").op(NEW_OBJECT);
    let code = Asm::new()
        .set("a", new_object)
        .set("b", new_object)
        .get("a")
        .push_str("peer")
        .get("b")
        .op(SET_MEMBER)
        .get("b")
        .push_str("peer")
        .get("a")
        .op(SET_MEMBER)
        .build();
    player.run_actions(&code).unwrap();
    let a = player.get_variable("a").unwrap().as_object().unwrap();
    let b = player.get_variable("b").unwrap().as_object().unwrap();

    player.set_variable("a", Value::Undefined).unwrap();
    player.set_variable("b", Value::Undefined).unwrap();
    assert!(player.runtime().heap().get(a).is_some());

    let report = player.collect_garbage();
    assert!(report.freed_by_sweep >= 2);
    assert!(player.runtime().heap().get(a).is_none());
    assert!(player.runtime().heap().get(b).is_none());
}

#[test]
fn test_created_clip_is_rendered() {
    let (mut player, _) = player();
    let child = player
        .call_method(
            "_root",
            "createEmptyMovieClip",
            &[Value::from("child"), Value::Number(1.0)],
        )
        .unwrap();
    assert!(child.as_object().is_some());
    assert_eq!(player.get_variable("child").unwrap(), child);

    let mut items: Vec<DisplayItem> = Vec::new();
    player.display(&mut items);
    assert_eq!(items.len(), 2);
}

#[test]
fn test_engine_handle_shared_across_threads() {
    let (player, _) = player();
    let handle = player.into_handle();
    let worker = {
        let handle = handle.clone();
        thread::spawn(move || {
            handle
                .lock()
                .set_variable("fromWorker", Value::Number(1.0))
                .unwrap();
        })
    };
    worker.join().unwrap();
    assert_eq!(
        handle.lock().get_variable("fromWorker").unwrap(),
        Value::Number(1.0)
    );
}
