//! Tests for AVM2 instruction decoding

use bytecode_system::{Condition, Op};

fn decode_all(code: &[u8]) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut pos = 0;
    while pos < code.len() {
        let (op, next) = Op::decode(code, pos).unwrap();
        ops.push(op);
        pos = next;
    }
    ops
}

#[test]
fn test_trace_sequence() {
    let ops = decode_all(&[0x5D, 0x01, 0x2C, 0x02, 0x4F, 0x01, 0x01, 0x47]);
    assert_eq!(
        ops,
        vec![
            Op::FindPropStrict(1),
            Op::PushString(2),
            Op::CallProperty {
                name: 1,
                arg_count: 1,
                lex: false,
                void: true
            },
            Op::ReturnVoid,
        ]
    );
}

#[test]
fn test_branch_conditions() {
    let ops = decode_all(&[0x0C, 1, 0, 0, 0x11, 2, 0, 0, 0x1A, 3, 0, 0]);
    assert_eq!(
        ops,
        vec![
            Op::Branch(Condition::NotLess, 1),
            Op::Branch(Condition::True, 2),
            Op::Branch(Condition::StrictNotEqual, 3),
        ]
    );
    assert_eq!(Condition::Always.operand_count(), 0);
    assert_eq!(Condition::False.operand_count(), 1);
    assert_eq!(Condition::Less.operand_count(), 2);
}

#[test]
fn test_pushshort_sign() {
    // 0xFFFF encoded as a u30 is -1 as a short
    let ops = decode_all(&[0x25, 0xFF, 0xFF, 0x03]);
    assert_eq!(ops, vec![Op::PushShort(-1)]);
}

#[test]
fn test_debug_operands_skipped() {
    let ops = decode_all(&[0xEF, 0x01, 0x05, 0x00, 0x00, 0xF0, 0x0A]);
    assert_eq!(ops, vec![Op::Debug, Op::DebugLine(10)]);
}

#[test]
fn test_integer_arithmetic_opcodes() {
    let ops = decode_all(&[0xC5, 0xC6, 0xC7, 0xC2, 0x04]);
    assert_eq!(
        ops,
        vec![Op::AddInt, Op::SubtractInt, Op::MultiplyInt, Op::IncLocalInt(4)]
    );
}
