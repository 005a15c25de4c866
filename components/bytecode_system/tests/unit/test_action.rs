//! Tests for action record decoding

use bytecode_system::{Action, ActionBuffer, ActionError, FunctionFlags, PushValue};

fn record(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![opcode];
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

#[test]
fn test_push_multiple_types() {
    let mut payload = vec![0x00, b'a', 0x00, 0x02, 0x03, 0x04, 0x02, 0x05, 0x01, 0x08, 0x03];
    payload.extend_from_slice(&[0x09, 0x00, 0x01]);
    let buffer = ActionBuffer::new(record(0x96, &payload));
    let (action, next) = buffer.decode_at(0).unwrap();
    assert_eq!(
        action,
        Action::Push(vec![
            PushValue::Str("a".into()),
            PushValue::Null,
            PushValue::Undefined,
            PushValue::Register(2),
            PushValue::Bool(true),
            PushValue::Constant8(3),
            PushValue::Constant16(256),
        ])
    );
    assert_eq!(next, buffer.len());
}

#[test]
fn test_unknown_push_type() {
    let buffer = ActionBuffer::new(record(0x96, &[0x0B]));
    assert_eq!(
        buffer.decode_at(0),
        Err(ActionError::BadPushType { tag: 11, offset: 0 })
    );
}

#[test]
fn test_truncated_record() {
    let buffer = ActionBuffer::new(vec![0x99, 0x02, 0x00, 0x01]);
    assert_eq!(
        buffer.decode_at(0),
        Err(ActionError::Truncated { offset: 0 })
    );
}

#[test]
fn test_jump_and_if_offsets() {
    let mut code = record(0x99, &(-7i16).to_le_bytes());
    code.extend(record(0x9D, &4i16.to_le_bytes()));
    let buffer = ActionBuffer::new(code);
    assert_eq!(buffer.decode_at(0).unwrap(), (Action::Jump(-7), 5));
    assert_eq!(buffer.decode_at(5).unwrap(), (Action::If(4), 10));
}

#[test]
fn test_constant_pool() {
    let buffer = ActionBuffer::new(record(0x88, b"\x02\x00foo\0bar\0"));
    assert_eq!(
        buffer.decode_at(0).unwrap().0,
        Action::ConstantPool(vec!["foo".into(), "bar".into()])
    );
}

#[test]
fn test_define_function() {
    // function f(a, b) with a 3-byte body
    let buffer = ActionBuffer::new(record(0x9B, b"f\0\x02\x00a\0b\0\x03\x00"));
    match buffer.decode_at(0).unwrap().0 {
        Action::DefineFunction(def) => {
            assert_eq!(def.name, "f");
            assert!(!def.is_function2);
            assert_eq!(def.params.len(), 2);
            assert_eq!(def.params[1].name, "b");
            assert_eq!(def.body_len, 3);
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn test_define_function2() {
    // function2 g(x in r1) with 3 registers, preload this
    let buffer = ActionBuffer::new(record(0x8E, b"g\0\x01\x00\x03\x01\x00\x01x\0\x05\x00"));
    match buffer.decode_at(0).unwrap().0 {
        Action::DefineFunction(def) => {
            assert!(def.is_function2);
            assert_eq!(def.register_count, 3);
            assert!(def.flags.has(FunctionFlags::PRELOAD_THIS));
            assert!(!def.flags.has(FunctionFlags::PRELOAD_GLOBAL));
            assert_eq!(def.params[0].register, 1);
            assert_eq!(def.params[0].name, "x");
            assert_eq!(def.body_len, 5);
        }
        other => panic!("expected function2, got {:?}", other),
    }
}

#[test]
fn test_gotoframe2_scene_bias() {
    let buffer = ActionBuffer::new(record(0x9F, &[0x03, 0x02, 0x00]));
    assert_eq!(
        buffer.decode_at(0).unwrap().0,
        Action::GotoFrame2 {
            play: true,
            scene_bias: 2
        }
    );
}

#[test]
fn test_unknown_opcodes_decode() {
    let buffer = ActionBuffer::new(vec![0x01, 0xF0, 0x00, 0x00]);
    assert_eq!(buffer.decode_at(0).unwrap(), (Action::Unknown(0x01), 1));
    assert_eq!(buffer.decode_at(1).unwrap(), (Action::Unknown(0xF0), 4));
}

#[test]
fn test_disassembly_text() {
    let mut code = record(0x96, &[0x07, 0x07, 0x00, 0x00, 0x00]);
    code.push(0x0A);
    code.extend(record(0x99, &(-5i16).to_le_bytes()));
    let listing = ActionBuffer::new(code).disassemble().unwrap();
    let text: Vec<String> = listing.iter().map(|(_, a)| a.to_string()).collect();
    assert_eq!(text, vec!["push 7", "add", "jump -5"]);
}

#[test]
fn test_clones_share_bytes() {
    let a = ActionBuffer::new(vec![0x00]);
    let b = a.clone();
    assert!(a.same_buffer(&b));
    assert!(!a.same_buffer(&ActionBuffer::new(vec![0x00])));
}
