//! Tests for ABC loading and validation

use bytecode_system::{
    AbcError, AbcFile, ConstantKind, Multiname, ReadError, TraitKind, MAX_FRAME_SLOTS,
};

fn u30(out: &mut Vec<u8>, mut v: u32) {
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn string(out: &mut Vec<u8>, s: &str) {
    u30(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

/// Pools: strings ["", "trace", "hi", "Foo"], one package namespace,
/// multinames [*, trace, <rtqnamel>, Foo].
fn header_and_pool(major: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(&major.to_le_bytes());
    u30(&mut out, 2); // ints
    u30(&mut out, (-3i32) as u32);
    u30(&mut out, 0); // uints
    u30(&mut out, 2); // doubles
    out.extend_from_slice(&2.5f64.to_le_bytes());
    u30(&mut out, 4); // strings
    string(&mut out, "trace");
    string(&mut out, "hi");
    string(&mut out, "Foo");
    u30(&mut out, 2); // namespaces
    out.push(0x16);
    u30(&mut out, 0);
    u30(&mut out, 0); // ns sets
    u30(&mut out, 4); // multinames
    out.push(0x07);
    u30(&mut out, 1);
    u30(&mut out, 1);
    out.push(0x11);
    out.push(0x07);
    u30(&mut out, 1);
    u30(&mut out, 3);
    out
}

fn body(method: u32, code: &[u8], exceptions: &[[u32; 5]]) -> Vec<u8> {
    body_with_frame(method, 2, 1, code, exceptions)
}

fn body_with_frame(
    method: u32,
    max_stack: u32,
    local_count: u32,
    code: &[u8],
    exceptions: &[[u32; 5]],
) -> Vec<u8> {
    let mut out = Vec::new();
    u30(&mut out, method);
    u30(&mut out, max_stack);
    u30(&mut out, local_count);
    u30(&mut out, 0);
    u30(&mut out, 1);
    u30(&mut out, code.len() as u32);
    out.extend_from_slice(code);
    u30(&mut out, exceptions.len() as u32);
    for e in exceptions {
        for v in e {
            u30(&mut out, *v);
        }
    }
    u30(&mut out, 0);
    out
}

/// One method, one script whose traits are `script_traits` (count included).
fn file(script_traits: &[u8], bodies: &[Vec<u8>]) -> Vec<u8> {
    let mut out = header_and_pool(46);
    u30(&mut out, 1); // methods
    u30(&mut out, 0);
    u30(&mut out, 0);
    u30(&mut out, 0);
    out.push(0);
    u30(&mut out, 0); // metadata
    u30(&mut out, 0); // classes
    u30(&mut out, 1); // scripts
    u30(&mut out, 0);
    out.extend_from_slice(script_traits);
    u30(&mut out, bodies.len() as u32);
    for b in bodies {
        out.extend_from_slice(b);
    }
    out
}

const TRACE_HI: [u8; 6] = [0x5D, 0x01, 0x2C, 0x02, 0x4F, 0x01];

#[test]
fn test_minimal_file_parses() {
    let code = [&TRACE_HI[..], &[0x47]].concat();
    let abc = AbcFile::parse(&file(&[0], &[body(0, &code, &[])])).unwrap();

    assert_eq!(abc.major_version, 46);
    assert_eq!(abc.constant_pool.ints, vec![0, -3]);
    assert_eq!(abc.constant_pool.doubles[1], 2.5);
    assert!(abc.constant_pool.doubles[0].is_nan());
    assert_eq!(abc.string(2), Some("hi"));
    assert_eq!(abc.multiname_local_name(1), Some("trace"));
    assert_eq!(abc.display_multiname(1).to_string(), "trace");
    assert_eq!(abc.body_of(0).map(|b| b.code.len()), Some(7));
    assert_eq!(abc.method_name(0), "<anonymous>");
}

#[test]
fn test_slot_trait_with_constant_value() {
    // slot "Foo" id 1, type *, value int[1]
    let traits = [1, 3, 0x00, 1, 0, 1, 0x03];
    let abc = AbcFile::parse(&file(&traits, &[])).unwrap();
    match &abc.scripts[0].traits[0].kind {
        TraitKind::Slot { slot_id, value, .. } => {
            assert_eq!(*slot_id, 1);
            let value = value.unwrap();
            assert_eq!(value.kind, ConstantKind::Int);
            assert_eq!(value.index, 1);
        }
        other => panic!("expected slot, got {:?}", other),
    }
    assert!(abc.body_of(0).is_none());
}

#[test]
fn test_rejects_other_major_versions() {
    let mut bytes = header_and_pool(47);
    bytes.truncate(4);
    assert_eq!(
        AbcFile::parse(&bytes),
        Err(AbcError::UnsupportedVersion {
            major: 47,
            minor: 16
        })
    );
}

#[test]
fn test_trait_multiname_out_of_range() {
    let traits = [1, 9, 0x00, 0, 0, 0];
    assert_eq!(
        AbcFile::parse(&file(&traits, &[])),
        Err(AbcError::IndexOutOfRange {
            table: "multiname",
            index: 9,
            len: 4
        })
    );
}

#[test]
fn test_trait_name_must_be_qname() {
    let traits = [1, 2, 0x00, 0, 0, 0];
    assert_eq!(
        AbcFile::parse(&file(&traits, &[])),
        Err(AbcError::TraitNameNotQName(2))
    );
}

#[test]
fn test_bad_trait_kind() {
    let traits = [1, 1, 0x07];
    assert_eq!(
        AbcFile::parse(&file(&traits, &[])),
        Err(AbcError::BadTraitKind(7))
    );
}

#[test]
fn test_method_trait_index_checked() {
    // method trait pointing at method 4 of 1
    let traits = [1, 1, 0x01, 0, 4];
    assert!(matches!(
        AbcFile::parse(&file(&traits, &[])),
        Err(AbcError::IndexOutOfRange { table: "method", .. })
    ));
}

#[test]
fn test_duplicate_body_rejected() {
    let b = body(0, &[0x47], &[]);
    assert_eq!(
        AbcFile::parse(&file(&[0], &[b.clone(), b])),
        Err(AbcError::DuplicateBody(0))
    );
}

#[test]
fn test_trailing_data_rejected() {
    let mut bytes = file(&[0], &[]);
    bytes.push(0xAA);
    assert_eq!(AbcFile::parse(&bytes), Err(AbcError::TrailingData(1)));
}

#[test]
fn test_truncated_file() {
    let bytes = file(&[0], &[body(0, &[0x47], &[])]);
    let result = AbcFile::parse(&bytes[..bytes.len() - 3]);
    assert!(matches!(
        result,
        Err(AbcError::Read(ReadError::UnexpectedEof { .. }))
    ));
}

#[test]
fn test_oversized_max_stack_rejected() {
    let b = body_with_frame(0, 0x3FFF_FFFF, 1, &[0x47], &[]);
    assert_eq!(
        AbcFile::parse(&file(&[0], &[b])),
        Err(AbcError::FrameTooLarge {
            method: 0,
            field: "max_stack",
            value: 0x3FFF_FFFF,
        })
    );
}

#[test]
fn test_oversized_local_count_rejected() {
    let b = body_with_frame(0, 2, MAX_FRAME_SLOTS + 1, &[0x47], &[]);
    assert!(matches!(
        AbcFile::parse(&file(&[0], &[b])),
        Err(AbcError::FrameTooLarge {
            field: "local_count",
            ..
        })
    ));

    let b = body_with_frame(0, 2, MAX_FRAME_SLOTS, &[0x47], &[]);
    assert!(AbcFile::parse(&file(&[0], &[b])).is_ok());
}

#[test]
fn test_oversized_slot_id_rejected() {
    // slot "Foo" with id 1_000_000, type *, no value
    let mut traits = vec![1, 3, 0x00];
    u30(&mut traits, 1_000_000);
    traits.extend_from_slice(&[0, 0]);
    assert_eq!(
        AbcFile::parse(&file(&traits, &[])),
        Err(AbcError::SlotIdTooLarge(1_000_000))
    );
}

#[test]
fn test_exception_range_outside_code() {
    let b = body(0, &[0x02, 0x47], &[[0, 5, 1, 0, 0]]);
    assert_eq!(
        AbcFile::parse(&file(&[0], &[b])),
        Err(AbcError::BadExceptionRange(0))
    );
}

#[test]
fn test_bad_multiname_kind() {
    let mut bytes = header_and_pool(46);
    // rewrite the last multiname kind byte (QName at len-3)
    let at = bytes.len() - 3;
    bytes[at] = 0x42;
    assert_eq!(AbcFile::parse(&bytes), Err(AbcError::BadMultinameKind(0x42)));
}

#[test]
fn test_multiname_table_shape() {
    let abc = AbcFile::parse(&file(&[0], &[])).unwrap();
    assert_eq!(abc.constant_pool.multinames[0], Multiname::Any);
    assert!(abc.constant_pool.multinames[2].has_runtime_name());
    assert_eq!(abc.class_by_name("Foo"), None);
}
