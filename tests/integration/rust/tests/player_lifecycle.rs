//! Player Lifecycle Tests
//!
//! Mixes both interpreters in one player and checks that the heap stays
//! consistent across frames and collections.

use core_types::Value;
use integration_tests::{recording_player, AbcBuilder, Code, TraitSpec};
use interpreter::PlayerConfig;

const FRAME: f64 = 1.0 / 12.0;

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.push(0x96);
    out.extend_from_slice(&(s.len() as u16 + 2).to_le_bytes());
    out.push(0);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn push_zero(out: &mut Vec<u8>) {
    out.push(0x96);
    out.extend_from_slice(&5u16.to_le_bytes());
    out.push(7);
    out.extend_from_slice(&0i32.to_le_bytes());
}

/// `a = new Object(); b = new Object(); a.peer = b; b.peer = a;`
fn linked_pair() -> Vec<u8> {
    let mut code = Vec::new();
    for name in ["a", "b"] {
        push_str(&mut code, name);
        push_zero(&mut code);
        push_str(&mut code, "Object");
        code.push(0x40);
        code.push(0x1D);
    }
    for (from, to) in [("a", "b"), ("b", "a")] {
        push_str(&mut code, from);
        code.push(0x1C);
        push_str(&mut code, "peer");
        push_str(&mut code, to);
        code.push(0x1C);
        code.push(0x4F);
    }
    code.push(0x00);
    code
}

/// Test: a cycle survives plain frames and dies at the scheduled collection
#[test]
fn test_cycle_collected_on_schedule() {
    let config = PlayerConfig::default().with_gc_every_frames(2);
    let (mut player, _) = recording_player(config);
    player.run_actions(&linked_pair()).unwrap();
    let a = player.get_variable("a").unwrap().as_object().unwrap();
    let b = player.get_variable("b").unwrap().as_object().unwrap();
    player.set_variable("a", Value::Undefined).unwrap();
    player.set_variable("b", Value::Undefined).unwrap();

    let before = player.runtime().heap().stats().collections;
    player.advance(FRAME);
    assert!(player.runtime().heap().get(a).is_some());

    player.advance(FRAME);
    let heap = player.runtime().heap();
    assert!(heap.get(a).is_none());
    assert!(heap.get(b).is_none());
    assert_eq!(heap.stats().collections, before + 1);
}

/// Test: live object count tracks the heap after a collection
#[test]
fn test_stats_consistent_after_collection() {
    let (mut player, _) = recording_player(PlayerConfig::default());
    player.run_actions(&linked_pair()).unwrap();
    player.set_variable("a", Value::Undefined).unwrap();
    player.set_variable("b", Value::Undefined).unwrap();

    let report = player.collect_garbage();
    let stats = player.runtime().heap().stats();
    assert!(report.freed_by_sweep >= 2);
    assert_eq!(stats.live, player.runtime().heap().len());
    assert!(stats.allocated >= stats.live as u64 + stats.freed_by_sweep);
}

/// Test: values set from the host are visible to ABC scripts
#[test]
fn test_host_global_visible_to_abc() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    player
        .set_variable("_global.fromHost", Value::from("shared"))
        .unwrap();

    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let from_host = abc.qname("fromHost");
    let init = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .trace(trace, |c| c.get_lex(from_host))
            .return_void(),
    );
    abc.script(init, vec![]);
    player.load_abc(&abc.finish()).unwrap();

    assert_eq!(sink.lines(), vec!["shared"]);
}

/// Test: classes defined by ABC survive collections between frames
#[test]
fn test_abc_classes_survive_frames() {
    let (mut player, _) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let widget = abc.qname("Widget");
    let iinit = abc.method("Widget", 0, Code::new().return_void());
    let cinit = abc.method("", 0, Code::new().return_void());
    let class = abc.class("Widget", None, iinit, cinit, vec![], vec![]);
    let init = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .get_local(0)
            .push_null()
            .new_class(class)
            .init_property(widget)
            .return_void(),
    );
    abc.script(init, vec![TraitSpec::Class { name: widget, class }]);
    player.load_abc(&abc.finish()).unwrap();

    let id = player.runtime().domain().class("Widget").unwrap();
    for _ in 0..3 {
        player.advance(FRAME);
    }
    player.collect_garbage();
    assert!(player.runtime().heap().get(id).is_some());
}

/// Test: frame scripts and ABC scripts write to the same trace sink
#[test]
fn test_frames_and_abc_share_sink() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let frames = ["one", "two"]
        .iter()
        .map(|text| {
            let mut frame = Vec::new();
            push_str(&mut frame, text);
            frame.extend_from_slice(&[0x26, 0x00]);
            frame
        })
        .collect();
    player.load_action_frames(frames).unwrap();

    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let text = abc.string("abc");
    let init = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .trace(trace, |c| c.push_string(text))
            .return_void(),
    );
    abc.script(init, vec![]);
    player.load_abc(&abc.finish()).unwrap();
    player.advance(FRAME);

    assert_eq!(sink.lines(), vec!["one", "abc", "two"]);
}
