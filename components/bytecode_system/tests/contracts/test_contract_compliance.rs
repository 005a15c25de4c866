//! Contract compliance tests for bytecode_system
//!
//! These tests pin the decoding surface the interpreter relies on.

use bytecode_system::{
    AbcError, AbcFile, Action, ActionBuffer, ByteReader, Op, OpError, ABC_MAJOR_VERSION,
};

/// Contract: decoding past the end is `End`, never an error
#[test]
fn test_contract_end_past_buffer() {
    let buffer = ActionBuffer::new(Vec::new());
    assert!(buffer.is_empty());
    assert_eq!(buffer.decode_at(0).unwrap(), (Action::End, 0));
}

/// Contract: long records report the offset of the next record
#[test]
fn test_contract_record_length() {
    let buffer = ActionBuffer::new(vec![0x87, 0x01, 0x00, 0x02, 0x4C]);
    assert_eq!(buffer.decode_at(0).unwrap(), (Action::StoreRegister(2), 4));
    assert_eq!(buffer.decode_at(4).unwrap(), (Action::PushDuplicate, 5));
}

/// Contract: the loader only accepts major version 46
#[test]
fn test_contract_abc_version() {
    assert_eq!(ABC_MAJOR_VERSION, 46);
    let err = AbcFile::parse(&[0, 0, 10, 0]).unwrap_err();
    assert!(matches!(err, AbcError::UnsupportedVersion { major: 10, .. }));
}

/// Contract: empty input is a read error, not a panic
#[test]
fn test_contract_abc_empty_input() {
    assert!(matches!(AbcFile::parse(&[]), Err(AbcError::Read(_))));
}

/// Contract: unknown AVM2 opcodes are reported with their offset
#[test]
fn test_contract_unknown_opcode() {
    assert_eq!(
        Op::decode(&[0x01], 0),
        Err(OpError::UnknownOpcode {
            opcode: 0x01,
            offset: 0
        })
    );
}

/// Contract: the reader is little-endian
#[test]
fn test_contract_reader_endianness() {
    let mut r = ByteReader::new(&[0x78, 0x56, 0x34, 0x12]);
    assert_eq!(r.u32().unwrap(), 0x1234_5678);
}
