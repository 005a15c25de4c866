//! Unit tests for interpreter components

#[path = "../common/asm.rs"]
mod asm;

use asm::*;
use core_types::{ErrorKind, Value};
use interpreter::{Player, PlayerConfig, PlayerError, RecordingLogSink, SinkEvent};
use memory_manager::MAX_ARRAY_LENGTH;

fn player_with(config: PlayerConfig) -> (Player, RecordingLogSink) {
    let sink = RecordingLogSink::new();
    let mut player = Player::new(config).with_log_sink(sink.clone());
    player.create_instance();
    (player, sink)
}

fn player() -> (Player, RecordingLogSink) {
    player_with(PlayerConfig::default())
}

fn script_error(result: Result<Value, PlayerError>) -> ErrorKind {
    match result {
        Err(PlayerError::Script(error)) => error.kind,
        other => panic!("expected a script error, got {:?}", other),
    }
}

// ============================================================================
// Arithmetic and coercion
// ============================================================================

#[test]
fn test_push_add_set_variable() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("x", |a| a.push_int(5).push_int(7).op(ADD))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("x").unwrap(), Value::Number(12.0));
}

#[test]
fn test_add2_concatenates_strings() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("s", |a| a.push_str("a").push_int(1).op(ADD2))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("s").unwrap(), Value::from("a1"));
}

#[test]
fn test_add_of_unparsable_string_is_nan() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("n", |a| a.push_str("abc").push_int(1).op(ADD))
        .build();
    player.run_actions(&code).unwrap();
    match player.get_variable("n").unwrap() {
        Value::Number(n) => assert!(n.is_nan()),
        other => panic!("expected NaN, got {:?}", other),
    }
}

#[test]
fn test_comparisons_push_numbers_in_version_4() {
    let (mut player, _) = player_with(PlayerConfig::default().with_version(4));
    let code = Asm::new()
        .set("lt", |a| a.push_int(1).push_int(2).op(LESS))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("lt").unwrap(), Value::Number(1.0));
}

#[test]
fn test_comparisons_push_booleans_in_version_5() {
    let (mut player, _) = player_with(PlayerConfig::default().with_version(5));
    let code = Asm::new()
        .set("lt", |a| a.push_int(1).push_int(2).op(LESS))
        .set("no", |a| a.push_bool(true).op(NOT))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("lt").unwrap(), Value::Boolean(true));
    assert_eq!(player.get_variable("no").unwrap(), Value::Boolean(false));
}

#[test]
fn test_typeof_names() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("t1", |a| a.push_int(3).op(TYPE_OF))
        .set("t2", |a| a.push_undefined().op(TYPE_OF))
        .set("t3", |a| a.get("trace").op(TYPE_OF))
        .set("t4", |a| a.get("_root").op(TYPE_OF))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("t1").unwrap(), Value::from("number"));
    assert_eq!(player.get_variable("t2").unwrap(), Value::from("undefined"));
    assert_eq!(player.get_variable("t3").unwrap(), Value::from("function"));
    assert_eq!(player.get_variable("t4").unwrap(), Value::from("movieclip"));
}

// ============================================================================
// Registers and branches
// ============================================================================

#[test]
fn test_store_register_keeps_value_on_stack() {
    let (mut player, _) = player();
    let code = Asm::new()
        .push_str("r")
        .push_int(9)
        .store_register(1)
        .op(SET_VARIABLE)
        .set("again", |a| a.push_register(1))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("r").unwrap(), Value::Number(9.0));
    assert_eq!(player.get_variable("again").unwrap(), Value::Number(9.0));
}

#[test]
fn test_if_skips_records() {
    let (mut player, _) = player();
    let skipped = Asm::new().set("hit", |a| a.push_int(1));
    let code = Asm::new()
        .push_bool(true)
        .branch_if(skipped.len() as i16)
        .set("hit", |a| a.push_int(1))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("hit").unwrap(), Value::Undefined);
}

#[test]
fn test_jump_out_of_block_is_malformed() {
    let (mut player, _) = player();
    let code = Asm::new().jump(400).build();
    assert_eq!(script_error(player.run_actions(&code)), ErrorKind::MalformedCode);
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_define_and_call_function() {
    let (mut player, _) = player();
    let body = Asm::new().get("a").get("b").op(ADD2).op(RETURN);
    let code = Asm::new()
        .function("sum", &["a", "b"], body)
        .set("r", |a| {
            a.push_int(4)
                .push_int(3)
                .push_int(2)
                .push_str("sum")
                .op(CALL_FUNCTION)
        })
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("r").unwrap(), Value::Number(7.0));
}

#[test]
fn test_calling_undefined_name_yields_undefined() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("r", |a| a.push_int(0).push_str("missing").op(CALL_FUNCTION))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("r").unwrap(), Value::Undefined);
}

#[test]
fn test_unbounded_recursion_hits_depth_limit() {
    let (mut player, _) = player_with(PlayerConfig::default().with_max_call_depth(16));
    let body = Asm::new()
        .push_int(0)
        .push_str("f")
        .op(CALL_FUNCTION)
        .op(RETURN);
    let code = Asm::new()
        .function("f", &[], body)
        .push_int(0)
        .push_str("f")
        .op(CALL_FUNCTION)
        .build();
    assert_eq!(
        script_error(player.run_actions(&code)),
        ErrorKind::CallDepthExceeded
    );
}

#[test]
fn test_throw_surfaces_value() {
    let (mut player, _) = player();
    let code = Asm::new().push_str("boom").op(THROW).build();
    assert_eq!(
        script_error(player.run_actions(&code)),
        ErrorKind::Thrown(Value::from("boom"))
    );
}

#[test]
fn test_faulting_function_body_returns_to_caller() {
    let (mut player, sink) = player();
    let body = Asm::new().op(0x7F);
    let code = Asm::new()
        .function("f", &[], body)
        .push_int(0)
        .push_str("f")
        .op(CALL_FUNCTION)
        .op(POP)
        .push_str("after")
        .op(TRACE)
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(sink.lines(), vec!["after".to_string()]);
}

#[test]
fn test_throw_inside_function_still_propagates() {
    let (mut player, _) = player();
    let body = Asm::new().push_str("inner").op(THROW);
    let code = Asm::new()
        .function("f", &[], body)
        .push_int(0)
        .push_str("f")
        .op(CALL_FUNCTION)
        .build();
    assert_eq!(
        script_error(player.run_actions(&code)),
        ErrorKind::Thrown(Value::from("inner"))
    );
}

// ============================================================================
// Objects
// ============================================================================

#[test]
fn test_init_object_and_get_member() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("o", |a| {
            a.push_str("a")
                .push_int(1)
                .push_str("b")
                .push_int(2)
                .push_int(2)
                .op(INIT_OBJECT)
        })
        .set("v", |a| a.get("o").push_str("b").op(GET_MEMBER))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("v").unwrap(), Value::Number(2.0));
    assert_eq!(player.get_variable("o.a").unwrap(), Value::Number(1.0));
}

#[test]
fn test_prototype_member_is_shadowed_not_overwritten() {
    let (mut player, _) = player();
    let code = Asm::new()
        .function("C", &[], Asm::new())
        // C.prototype.x = 1
        .get("C")
        .push_str("prototype")
        .op(GET_MEMBER)
        .push_str("x")
        .push_int(1)
        .op(SET_MEMBER)
        .set("o", |a| a.push_int(0).push_str("C").op(NEW_OBJECT))
        .set("before", |a| a.get("o").push_str("x").op(GET_MEMBER))
        // o.x = 2
        .get("o")
        .push_str("x")
        .push_int(2)
        .op(SET_MEMBER)
        .set("proto", |a| {
            a.get("C")
                .push_str("prototype")
                .op(GET_MEMBER)
                .push_str("x")
                .op(GET_MEMBER)
        })
        .set("after", |a| a.get("o").push_str("x").op(GET_MEMBER))
        .set("is", |a| a.get("o").get("C").op(INSTANCE_OF))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("before").unwrap(), Value::Number(1.0));
    assert_eq!(player.get_variable("proto").unwrap(), Value::Number(1.0));
    assert_eq!(player.get_variable("after").unwrap(), Value::Number(2.0));
    assert_eq!(player.get_variable("is").unwrap(), Value::Boolean(true));
}

#[test]
fn test_as_set_prop_flags_hides_member() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("o", |a| {
            a.push_str("a")
                .push_int(1)
                .push_str("b")
                .push_int(2)
                .push_int(2)
                .op(INIT_OBJECT)
        })
        // ASSetPropFlags(o, "a", 1)
        .push_int(1)
        .push_str("a")
        .get("o")
        .push_int(3)
        .push_str("ASSetPropFlags")
        .op(CALL_FUNCTION)
        .op(POP)
        .build();
    player.run_actions(&code).unwrap();

    let object = player.get_variable("o").unwrap().as_object().unwrap();
    let names = player.runtime().enumerate(object);
    assert!(names.contains(&"b".to_string()));
    assert!(!names.contains(&"a".to_string()));
    // hidden, not removed
    assert_eq!(player.get_variable("o.a").unwrap(), Value::Number(1.0));
}

#[test]
fn test_array_literal_length() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("arr", |a| {
            a.push_int(3)
                .push_int(2)
                .push_int(1)
                .push_int(3)
                .op(INIT_ARRAY)
        })
        .set("n", |a| a.get("arr").push_str("length").op(GET_MEMBER))
        .set("first", |a| a.get("arr").push_str("0").op(GET_MEMBER))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("n").unwrap(), Value::Number(3.0));
    assert_eq!(player.get_variable("first").unwrap(), Value::Number(1.0));
}

#[test]
fn test_as_set_prop_flags_ignores_unknown_bits() {
    let (mut player, _) = player_with(PlayerConfig::default().with_version(6));
    let code = Asm::new()
        .set("o", |a| {
            a.push_str("a")
                .push_int(1)
                .push_int(1)
                .op(INIT_OBJECT)
        })
        // ASSetPropFlags(o, null, 8, 0)
        .push_int(0)
        .push_int(8)
        .push_null()
        .get("o")
        .push_int(4)
        .push_str("ASSetPropFlags")
        .op(CALL_FUNCTION)
        .op(POP)
        .build();
    player.run_actions(&code).unwrap();

    let object = player.get_variable("o").unwrap().as_object().unwrap();
    assert!(!player.runtime().enumerate(object).contains(&"a".to_string()));
    assert_eq!(player.get_variable("o.a").unwrap(), Value::Number(1.0));
}

#[test]
fn test_huge_array_index_is_named_member() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("arr", |a| a.push_int(7).push_int(1).op(INIT_ARRAY))
        .get("arr")
        .push_str("4000000000")
        .push_int(5)
        .op(SET_MEMBER)
        .set("n", |a| a.get("arr").push_str("length").op(GET_MEMBER))
        .set("v", |a| a.get("arr").push_str("4000000000").op(GET_MEMBER))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(player.get_variable("n").unwrap(), Value::Number(1.0));
    assert_eq!(player.get_variable("v").unwrap(), Value::Number(5.0));
}

#[test]
fn test_array_length_write_is_clamped() {
    let (mut player, _) = player();
    let code = Asm::new()
        .set("arr", |a| a.push_int(0).op(INIT_ARRAY))
        .get("arr")
        .push_str("length")
        .push_double(4e9)
        .op(SET_MEMBER)
        .set("n", |a| a.get("arr").push_str("length").op(GET_MEMBER))
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(
        player.get_variable("n").unwrap(),
        Value::Number(MAX_ARRAY_LENGTH as f64)
    );
}

#[test]
fn test_init_object_count_past_stack_underflows() {
    let (mut player, _) = player();
    let code = Asm::new().push_double(1e9).op(INIT_OBJECT).build();
    assert_eq!(script_error(player.run_actions(&code)), ErrorKind::StackUnderflow);
}

// ============================================================================
// Host services
// ============================================================================

#[test]
fn test_trace_reaches_recording_sink() {
    let (mut player, sink) = player();
    let code = Asm::new()
        .push_str("one")
        .op(TRACE)
        .push_int(2)
        .op(TRACE)
        .build();
    player.run_actions(&code).unwrap();
    assert_eq!(sink.lines(), vec!["one".to_string(), "2".to_string()]);
}

#[test]
fn test_fscommand_goes_to_sink() {
    let (mut player, sink) = player();
    let code = Asm::new().get_url("FSCommand:quit", "now").build();
    player.run_actions(&code).unwrap();
    assert_eq!(
        sink.events(),
        vec![SinkEvent::Command("quit".to_string(), "now".to_string())]
    );
}

#[test]
fn test_random_is_deterministic_for_a_seed() {
    fn draws(seed: u32) -> Vec<Value> {
        let (mut player, _) = player_with(PlayerConfig::default().with_random_seed(seed));
        let code = Asm::new()
            .set("a", |a| a.push_int(1000).op(RANDOM))
            .set("b", |a| a.push_int(1000).op(RANDOM))
            .build();
        player.run_actions(&code).unwrap();
        vec![
            player.get_variable("a").unwrap(),
            player.get_variable("b").unwrap(),
        ]
    }
    assert_eq!(draws(7), draws(7));
    for value in draws(7) {
        let Value::Number(n) = value else {
            panic!("random must be a number");
        };
        assert!((0.0..1000.0).contains(&n));
    }
}

#[test]
fn test_unknown_action_is_unimplemented() {
    let (mut player, _) = player();
    let code = Asm::new().op(0x7F).build();
    assert_eq!(
        script_error(player.run_actions(&code)),
        ErrorKind::UnimplementedOpcode(0x7F)
    );
}

#[test]
fn test_pop_on_empty_stack_underflows() {
    let (mut player, _) = player();
    let code = Asm::new().op(POP).build();
    assert_eq!(script_error(player.run_actions(&code)), ErrorKind::StackUnderflow);
}
