//! AVM2 instruction decoding.
//!
//! Method bodies are decoded one instruction at a time, like action
//! buffers, so branches can land anywhere. Branch offsets are kept raw:
//! conditional branches are relative to the following instruction,
//! `lookupswitch` offsets are relative to the switch itself.

use crate::reader::{ByteReader, ReadError};
use thiserror::Error;

/// Failure to decode one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    /// Opcode byte with no known meaning
    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode {
        /// The opcode byte
        opcode: u8,
        /// Offset of the instruction
        offset: usize,
    },
    /// Operand bytes missing or badly encoded
    #[error("bad operands at offset {offset}: {source}")]
    Operands {
        /// Offset of the instruction
        offset: usize,
        /// Underlying read failure
        source: ReadError,
    },
}

/// Branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// `jump`
    Always,
    /// `iftrue`
    True,
    /// `iffalse`
    False,
    /// `ifeq`
    Equal,
    /// `ifne`
    NotEqual,
    /// `iflt`
    Less,
    /// `ifle`
    LessEqual,
    /// `ifgt`
    Greater,
    /// `ifge`
    GreaterEqual,
    /// `ifstricteq`
    StrictEqual,
    /// `ifstrictne`
    StrictNotEqual,
    /// `ifnlt`
    NotLess,
    /// `ifnle`
    NotLessEqual,
    /// `ifngt`
    NotGreater,
    /// `ifnge`
    NotGreaterEqual,
}

impl Condition {
    /// Number of operands popped to evaluate the condition.
    pub fn operand_count(self) -> usize {
        match self {
            Condition::Always => 0,
            Condition::True | Condition::False => 1,
            _ => 2,
        }
    }
}

/// A decoded AVM2 instruction.
///
/// Operands that name pool entries are indices into the owning ABC file.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Nop,
    Throw,
    GetSuper(u32),
    SetSuper(u32),
    Kill(u32),
    Label,
    /// Conditional or unconditional branch
    Branch(Condition, i32),
    LookupSwitch {
        default: i32,
        cases: Vec<i32>,
    },
    PushWith,
    PopScope,
    NextName,
    HasNext,
    PushNull,
    PushUndefined,
    NextValue,
    PushByte(i8),
    PushShort(i16),
    PushTrue,
    PushFalse,
    PushNaN,
    Pop,
    Dup,
    Swap,
    PushString(u32),
    PushInt(u32),
    PushUint(u32),
    PushDouble(u32),
    PushScope,
    PushNamespace(u32),
    HasNext2 {
        object_reg: u32,
        index_reg: u32,
    },
    NewFunction(u32),
    Call {
        arg_count: u32,
    },
    Construct {
        arg_count: u32,
    },
    CallMethod {
        disp_id: u32,
        arg_count: u32,
    },
    CallStatic {
        method: u32,
        arg_count: u32,
    },
    CallSuper {
        name: u32,
        arg_count: u32,
        void: bool,
    },
    /// `callproperty`, `callproplex` and `callpropvoid`
    CallProperty {
        name: u32,
        arg_count: u32,
        lex: bool,
        void: bool,
    },
    ReturnVoid,
    ReturnValue,
    ConstructSuper {
        arg_count: u32,
    },
    ConstructProp {
        name: u32,
        arg_count: u32,
    },
    NewObject {
        arg_count: u32,
    },
    NewArray {
        arg_count: u32,
    },
    NewActivation,
    NewClass(u32),
    GetDescendants(u32),
    NewCatch(u32),
    FindPropStrict(u32),
    FindProperty(u32),
    GetLex(u32),
    SetProperty(u32),
    GetLocal(u32),
    SetLocal(u32),
    GetGlobalScope,
    GetScopeObject(u8),
    GetProperty(u32),
    InitProperty(u32),
    DeleteProperty(u32),
    GetSlot(u32),
    SetSlot(u32),
    GetGlobalSlot(u32),
    SetGlobalSlot(u32),
    ConvertString,
    ConvertInt,
    ConvertUint,
    ConvertDouble,
    ConvertBool,
    ConvertObject,
    Coerce(u32),
    CoerceBool,
    CoerceAny,
    CoerceInt,
    CoerceDouble,
    CoerceString,
    AsType(u32),
    AsTypeLate,
    CoerceUint,
    CoerceObject,
    Negate,
    Increment,
    IncLocal(u32),
    Decrement,
    DecLocal(u32),
    TypeOf,
    Not,
    BitNot,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    LShift,
    RShift,
    URShift,
    BitAnd,
    BitOr,
    BitXor,
    Equals,
    StrictEquals,
    LessThan,
    LessEquals,
    GreaterThan,
    GreaterEquals,
    InstanceOf,
    IsType(u32),
    IsTypeLate,
    In,
    IncrementInt,
    DecrementInt,
    IncLocalInt(u32),
    DecLocalInt(u32),
    NegateInt,
    AddInt,
    SubtractInt,
    MultiplyInt,
    Debug,
    DebugLine(u32),
    DebugFile(u32),
}

impl Op {
    /// Decodes the instruction at `pos`, returning it with the offset of the
    /// next instruction.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::{Condition, Op};
    ///
    /// let code = [0x24, 0xFF, 0x10, 0xFC, 0xFF, 0xFF];
    /// let (op, next) = Op::decode(&code, 0).unwrap();
    /// assert_eq!((op, next), (Op::PushByte(-1), 2));
    /// assert_eq!(Op::decode(&code, 2).unwrap(), (Op::Branch(Condition::Always, -4), 6));
    /// ```
    pub fn decode(code: &[u8], pos: usize) -> Result<(Op, usize), OpError> {
        let mut r = ByteReader::at(code, pos);
        let operands = |source: ReadError| OpError::Operands {
            offset: pos,
            source,
        };
        let opcode = r.u8().map_err(operands)?;
        let op = decode_operands(opcode, &mut r)
            .map_err(operands)?
            .ok_or(OpError::UnknownOpcode {
                opcode,
                offset: pos,
            })?;
        Ok((op, r.position()))
    }
}

fn branch(cond: Condition, r: &mut ByteReader<'_>) -> Result<Option<Op>, ReadError> {
    Ok(Some(Op::Branch(cond, r.s24()?)))
}

fn decode_operands(opcode: u8, r: &mut ByteReader<'_>) -> Result<Option<Op>, ReadError> {
    use Op::*;
    let op = match opcode {
        0x02 => Nop,
        0x03 => Throw,
        0x04 => GetSuper(r.u30()?),
        0x05 => SetSuper(r.u30()?),
        0x08 => Kill(r.u30()?),
        0x09 => Label,
        0x0C => return branch(Condition::NotLess, r),
        0x0D => return branch(Condition::NotLessEqual, r),
        0x0E => return branch(Condition::NotGreater, r),
        0x0F => return branch(Condition::NotGreaterEqual, r),
        0x10 => return branch(Condition::Always, r),
        0x11 => return branch(Condition::True, r),
        0x12 => return branch(Condition::False, r),
        0x13 => return branch(Condition::Equal, r),
        0x14 => return branch(Condition::NotEqual, r),
        0x15 => return branch(Condition::Less, r),
        0x16 => return branch(Condition::LessEqual, r),
        0x17 => return branch(Condition::Greater, r),
        0x18 => return branch(Condition::GreaterEqual, r),
        0x19 => return branch(Condition::StrictEqual, r),
        0x1A => return branch(Condition::StrictNotEqual, r),
        0x1B => {
            let default = r.s24()?;
            let case_count = r.u30()?;
            // The case count is one less than the number of offsets.
            let mut cases = Vec::with_capacity((case_count as usize + 1).min(1024));
            for _ in 0..=case_count {
                cases.push(r.s24()?);
            }
            LookupSwitch { default, cases }
        }
        0x1C => PushWith,
        0x1D => PopScope,
        0x1E => NextName,
        0x1F => HasNext,
        0x20 => PushNull,
        0x21 => PushUndefined,
        0x23 => NextValue,
        0x24 => PushByte(r.i8()?),
        0x25 => PushShort(r.u30()? as u16 as i16),
        0x26 => PushTrue,
        0x27 => PushFalse,
        0x28 => PushNaN,
        0x29 => Pop,
        0x2A => Dup,
        0x2B => Swap,
        0x2C => PushString(r.u30()?),
        0x2D => PushInt(r.u30()?),
        0x2E => PushUint(r.u30()?),
        0x2F => PushDouble(r.u30()?),
        0x30 => PushScope,
        0x31 => PushNamespace(r.u30()?),
        0x32 => HasNext2 {
            object_reg: r.u30()?,
            index_reg: r.u30()?,
        },
        0x40 => NewFunction(r.u30()?),
        0x41 => Call {
            arg_count: r.u30()?,
        },
        0x42 => Construct {
            arg_count: r.u30()?,
        },
        0x43 => CallMethod {
            disp_id: r.u30()?,
            arg_count: r.u30()?,
        },
        0x44 => CallStatic {
            method: r.u30()?,
            arg_count: r.u30()?,
        },
        0x45 | 0x4E => CallSuper {
            name: r.u30()?,
            arg_count: r.u30()?,
            void: opcode == 0x4E,
        },
        0x46 | 0x4C | 0x4F => CallProperty {
            name: r.u30()?,
            arg_count: r.u30()?,
            lex: opcode == 0x4C,
            void: opcode == 0x4F,
        },
        0x47 => ReturnVoid,
        0x48 => ReturnValue,
        0x49 => ConstructSuper {
            arg_count: r.u30()?,
        },
        0x4A => ConstructProp {
            name: r.u30()?,
            arg_count: r.u30()?,
        },
        0x55 => NewObject {
            arg_count: r.u30()?,
        },
        0x56 => NewArray {
            arg_count: r.u30()?,
        },
        0x57 => NewActivation,
        0x58 => NewClass(r.u30()?),
        0x59 => GetDescendants(r.u30()?),
        0x5A => NewCatch(r.u30()?),
        0x5D => FindPropStrict(r.u30()?),
        0x5E => FindProperty(r.u30()?),
        0x60 => GetLex(r.u30()?),
        0x61 => SetProperty(r.u30()?),
        0x62 => GetLocal(r.u30()?),
        0x63 => SetLocal(r.u30()?),
        0x64 => GetGlobalScope,
        0x65 => GetScopeObject(r.u8()?),
        0x66 => GetProperty(r.u30()?),
        0x68 => InitProperty(r.u30()?),
        0x6A => DeleteProperty(r.u30()?),
        0x6C => GetSlot(r.u30()?),
        0x6D => SetSlot(r.u30()?),
        0x6E => GetGlobalSlot(r.u30()?),
        0x6F => SetGlobalSlot(r.u30()?),
        0x70 => ConvertString,
        0x73 => ConvertInt,
        0x74 => ConvertUint,
        0x75 => ConvertDouble,
        0x76 => ConvertBool,
        0x77 => ConvertObject,
        0x80 => Coerce(r.u30()?),
        0x81 => CoerceBool,
        0x82 => CoerceAny,
        0x83 => CoerceInt,
        0x84 => CoerceDouble,
        0x85 => CoerceString,
        0x86 => AsType(r.u30()?),
        0x87 => AsTypeLate,
        0x88 => CoerceUint,
        0x89 => CoerceObject,
        0x90 => Negate,
        0x91 => Increment,
        0x92 => IncLocal(r.u30()?),
        0x93 => Decrement,
        0x94 => DecLocal(r.u30()?),
        0x95 => TypeOf,
        0x96 => Not,
        0x97 => BitNot,
        0xA0 => Add,
        0xA1 => Subtract,
        0xA2 => Multiply,
        0xA3 => Divide,
        0xA4 => Modulo,
        0xA5 => LShift,
        0xA6 => RShift,
        0xA7 => URShift,
        0xA8 => BitAnd,
        0xA9 => BitOr,
        0xAA => BitXor,
        0xAB => Equals,
        0xAC => StrictEquals,
        0xAD => LessThan,
        0xAE => LessEquals,
        0xAF => GreaterThan,
        0xB0 => GreaterEquals,
        0xB1 => InstanceOf,
        0xB2 => IsType(r.u30()?),
        0xB3 => IsTypeLate,
        0xB4 => In,
        0xC0 => IncrementInt,
        0xC1 => DecrementInt,
        0xC2 => IncLocalInt(r.u30()?),
        0xC3 => DecLocalInt(r.u30()?),
        0xC4 => NegateInt,
        0xC5 => AddInt,
        0xC6 => SubtractInt,
        0xC7 => MultiplyInt,
        0xD0..=0xD3 => GetLocal((opcode - 0xD0) as u32),
        0xD4..=0xD7 => SetLocal((opcode - 0xD4) as u32),
        0xEF => {
            r.u8()?;
            r.u30()?;
            r.u8()?;
            r.u30()?;
            Debug
        }
        0xF0 => DebugLine(r.u30()?),
        0xF1 => DebugFile(r.u30()?),
        _ => return Ok(None),
    };
    Ok(Some(op))
}
