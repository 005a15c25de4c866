//! Tag-encoded action records.
//!
//! An action buffer is a flat byte sequence. Each record starts with an
//! opcode byte; opcodes at or above `0x80` are followed by a little-endian
//! u16 payload length and the payload. Decoding is done one record at a time
//! so the interpreter can branch anywhere inside the buffer.

use crate::reader::{ByteReader, ReadError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure to decode a single action record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Record header or payload extends past the end of the buffer
    #[error("truncated action record at offset {offset}")]
    Truncated {
        /// Offset of the opcode byte
        offset: usize,
    },
    /// Payload did not match the opcode's layout
    #[error("malformed {name} payload at offset {offset}: {source}")]
    Malformed {
        /// Mnemonic of the opcode
        name: &'static str,
        /// Offset of the opcode byte
        offset: usize,
        /// Underlying read failure
        source: ReadError,
    },
    /// Unknown type tag inside a push payload
    #[error("unknown push type {tag} at offset {offset}")]
    BadPushType {
        /// The tag byte
        tag: u8,
        /// Offset of the opcode byte
        offset: usize,
    },
}

/// Function preload/suppress flags of `DefineFunction2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionFlags(pub u16);

impl FunctionFlags {
    /// Store `this` in the next register
    pub const PRELOAD_THIS: u16 = 0x0001;
    /// Do not create a `this` local
    pub const SUPPRESS_THIS: u16 = 0x0002;
    /// Store `arguments` in the next register
    pub const PRELOAD_ARGUMENTS: u16 = 0x0004;
    /// Do not create an `arguments` local
    pub const SUPPRESS_ARGUMENTS: u16 = 0x0008;
    /// Store `super` in the next register
    pub const PRELOAD_SUPER: u16 = 0x0010;
    /// Do not create a `super` local
    pub const SUPPRESS_SUPER: u16 = 0x0020;
    /// Store `_root` in the next register
    pub const PRELOAD_ROOT: u16 = 0x0040;
    /// Store `_parent` in the next register
    pub const PRELOAD_PARENT: u16 = 0x0080;
    /// Store `_global` in the next register
    pub const PRELOAD_GLOBAL: u16 = 0x0100;

    /// True if `flag` is set.
    pub fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }
}

/// A declared parameter; register 0 means "named local, no register".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParam {
    /// Register the argument is stored in, 0 for none
    pub register: u8,
    /// Parameter name
    pub name: String,
}

/// Header of a `DefineFunction`/`DefineFunction2` record.
///
/// The body is the `body_len` bytes that follow the record in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    /// Function name, empty for anonymous functions
    pub name: String,
    /// Declared parameters
    pub params: Vec<FunctionParam>,
    /// Local register count (function2 only)
    pub register_count: u8,
    /// Preload/suppress flags (function2 only)
    pub flags: FunctionFlags,
    /// True for `DefineFunction2`
    pub is_function2: bool,
    /// Length of the body in bytes
    pub body_len: u16,
}

/// One typed immediate of a `Push` record.
#[derive(Debug, Clone, PartialEq)]
pub enum PushValue {
    /// Inline string
    Str(String),
    /// 32-bit float
    Float(f32),
    /// null
    Null,
    /// undefined
    Undefined,
    /// Register contents
    Register(u8),
    /// Boolean
    Bool(bool),
    /// 64-bit double
    Double(f64),
    /// 32-bit integer
    Int(i32),
    /// Constant pool entry (8-bit index)
    Constant8(u8),
    /// Constant pool entry (16-bit index)
    Constant16(u16),
}

/// A decoded action record.
///
/// Records without a payload are named after their mnemonic.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// End of buffer
    End,
    NextFrame,
    PrevFrame,
    Play,
    Stop,
    ToggleQuality,
    StopSounds,
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    Less,
    And,
    Or,
    Not,
    StringEquals,
    StringLength,
    StringExtract,
    Pop,
    ToInteger,
    GetVariable,
    SetVariable,
    SetTarget2,
    StringAdd,
    GetProperty,
    SetProperty,
    CloneSprite,
    RemoveSprite,
    Trace,
    StartDrag,
    EndDrag,
    StringLess,
    Throw,
    RandomNumber,
    MbStringLength,
    CharToAscii,
    AsciiToChar,
    GetTime,
    MbStringExtract,
    MbCharToAscii,
    MbAsciiToChar,
    Delete,
    Delete2,
    DefineLocal,
    CallFunction,
    Return,
    Modulo,
    NewObject,
    DefineLocal2,
    InitArray,
    InitObject,
    TypeOf,
    TargetPath,
    Enumerate,
    Add2,
    Less2,
    Equals2,
    ToNumber,
    ToString,
    PushDuplicate,
    StackSwap,
    GetMember,
    SetMember,
    Increment,
    Decrement,
    CallMethod,
    NewMethod,
    InstanceOf,
    Enumerate2,
    BitAnd,
    BitOr,
    BitXor,
    BitLShift,
    BitRShift,
    BitURShift,
    StrictEquals,
    Greater,
    StringGreater,
    Extends,
    /// Go to a frame index
    GotoFrame(u16),
    /// Load a URL into a target; `FSCommand:` URLs go to the host
    GetUrl {
        /// URL
        url: String,
        /// Target window or level
        target: String,
    },
    /// Copy the stack top into a register
    StoreRegister(u8),
    /// Declare the constant pool
    ConstantPool(Vec<String>),
    /// Skip `skip` actions if `frame` is not loaded
    WaitForFrame {
        /// Frame to test
        frame: u16,
        /// Number of actions to skip
        skip: u8,
    },
    /// Change the target clip by path
    SetTarget(String),
    /// Go to a labelled frame
    GotoLabel(String),
    /// Stack-based `WaitForFrame`
    WaitForFrame2 {
        /// Number of actions to skip
        skip: u8,
    },
    /// Define a function (both generations)
    DefineFunction(FunctionDef),
    /// Push the object on the stack onto the scope chain for `block_len` bytes
    With {
        /// Length of the with block
        block_len: u16,
    },
    /// Push immediates
    Push(Vec<PushValue>),
    /// Unconditional relative branch
    Jump(i16),
    /// Stack-based `GetUrl`
    GetUrl2 {
        /// Send/load flags
        flags: u8,
    },
    /// Branch if the popped value is true
    If(i16),
    /// Run the actions of a frame
    Call,
    /// Stack-based goto
    GotoFrame2 {
        /// Play after the jump
        play: bool,
        /// Scene bias added to the frame number
        scene_bias: u16,
    },
    /// Opcode this decoder does not know
    Unknown(u8),
}

/// Immutable, shareable action buffer.
///
/// Cloning shares the underlying bytes, so functions defined inside a buffer
/// can keep a reference to it.
///
/// # Examples
///
/// ```
/// use bytecode_system::{Action, ActionBuffer, PushValue};
///
/// let buffer = ActionBuffer::new(vec![0x96, 0x05, 0x00, 0x07, 0x05, 0x00, 0x00, 0x00, 0x17]);
/// let (action, next) = buffer.decode_at(0).unwrap();
/// assert_eq!(action, Action::Push(vec![PushValue::Int(5)]));
/// assert_eq!(buffer.decode_at(next).unwrap().0, Action::Pop);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBuffer {
    code: Arc<[u8]>,
}

impl ActionBuffer {
    /// Wraps already-delimited action bytes.
    pub fn new(code: impl Into<Arc<[u8]>>) -> Self {
        ActionBuffer { code: code.into() }
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.code
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// True for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// True if both handles share the same bytes.
    pub fn same_buffer(&self, other: &ActionBuffer) -> bool {
        Arc::ptr_eq(&self.code, &other.code)
    }

    /// Decodes the record at `pc`, returning it with the offset of the next
    /// record.
    ///
    /// Reading past the end yields [`Action::End`].
    pub fn decode_at(&self, pc: usize) -> Result<(Action, usize), ActionError> {
        let code = &self.code[..];
        if pc >= code.len() {
            return Ok((Action::End, pc));
        }

        let opcode = code[pc];
        if opcode < 0x80 {
            return Ok((simple_action(opcode), pc + 1));
        }

        let mut header = ByteReader::at(code, pc + 1);
        let len = header
            .u16()
            .map_err(|_| ActionError::Truncated { offset: pc })? as usize;
        let start = pc + 3;
        let end = start + len;
        if end > code.len() {
            return Err(ActionError::Truncated { offset: pc });
        }

        let payload = &code[start..end];
        let action = decode_payload(opcode, payload, pc)?;
        Ok((action, end))
    }

    /// Decodes the whole buffer sequentially, stopping at `End`.
    ///
    /// Function bodies are decoded in line. Used for disassembly.
    pub fn disassemble(&self) -> Result<Vec<(usize, Action)>, ActionError> {
        let mut out = Vec::new();
        let mut pc = 0;
        loop {
            let (action, next) = self.decode_at(pc)?;
            if action == Action::End {
                break;
            }
            out.push((pc, action));
            pc = next;
        }
        Ok(out)
    }
}

impl From<Vec<u8>> for ActionBuffer {
    fn from(code: Vec<u8>) -> Self {
        ActionBuffer::new(code)
    }
}

fn simple_action(opcode: u8) -> Action {
    use Action::*;
    match opcode {
        0x00 => End,
        0x04 => NextFrame,
        0x05 => PrevFrame,
        0x06 => Play,
        0x07 => Stop,
        0x08 => ToggleQuality,
        0x09 => StopSounds,
        0x0A => Add,
        0x0B => Subtract,
        0x0C => Multiply,
        0x0D => Divide,
        0x0E => Equals,
        0x0F => Less,
        0x10 => And,
        0x11 => Or,
        0x12 => Not,
        0x13 => StringEquals,
        0x14 => StringLength,
        0x15 => StringExtract,
        0x17 => Pop,
        0x18 => ToInteger,
        0x1C => GetVariable,
        0x1D => SetVariable,
        0x20 => SetTarget2,
        0x21 => StringAdd,
        0x22 => GetProperty,
        0x23 => SetProperty,
        0x24 => CloneSprite,
        0x25 => RemoveSprite,
        0x26 => Trace,
        0x27 => StartDrag,
        0x28 => EndDrag,
        0x29 => StringLess,
        0x2A => Throw,
        0x30 => RandomNumber,
        0x31 => MbStringLength,
        0x32 => CharToAscii,
        0x33 => AsciiToChar,
        0x34 => GetTime,
        0x35 => MbStringExtract,
        0x36 => MbCharToAscii,
        0x37 => MbAsciiToChar,
        0x3A => Delete,
        0x3B => Delete2,
        0x3C => DefineLocal,
        0x3D => CallFunction,
        0x3E => Return,
        0x3F => Modulo,
        0x40 => NewObject,
        0x41 => DefineLocal2,
        0x42 => InitArray,
        0x43 => InitObject,
        0x44 => TypeOf,
        0x45 => TargetPath,
        0x46 => Enumerate,
        0x47 => Add2,
        0x48 => Less2,
        0x49 => Equals2,
        0x4A => ToNumber,
        0x4B => ToString,
        0x4C => PushDuplicate,
        0x4D => StackSwap,
        0x4E => GetMember,
        0x4F => SetMember,
        0x50 => Increment,
        0x51 => Decrement,
        0x52 => CallMethod,
        0x53 => NewMethod,
        0x54 => InstanceOf,
        0x55 => Enumerate2,
        0x60 => BitAnd,
        0x61 => BitOr,
        0x62 => BitXor,
        0x63 => BitLShift,
        0x64 => BitRShift,
        0x65 => BitURShift,
        0x66 => StrictEquals,
        0x67 => Greater,
        0x68 => StringGreater,
        0x69 => Extends,
        other => Unknown(other),
    }
}

fn decode_payload(opcode: u8, payload: &[u8], offset: usize) -> Result<Action, ActionError> {
    let mut r = ByteReader::new(payload);
    let name = mnemonic_for(opcode);
    let malformed = |source: ReadError| ActionError::Malformed {
        name,
        offset,
        source,
    };

    let action = match opcode {
        0x81 => Action::GotoFrame(r.u16().map_err(malformed)?),
        0x83 => Action::GetUrl {
            url: r.cstring().map_err(malformed)?,
            target: r.cstring().map_err(malformed)?,
        },
        0x87 => Action::StoreRegister(r.u8().map_err(malformed)?),
        0x88 => {
            let count = r.u16().map_err(malformed)?;
            let mut pool = Vec::with_capacity(count as usize);
            for _ in 0..count {
                pool.push(r.cstring().map_err(malformed)?);
            }
            Action::ConstantPool(pool)
        }
        0x8A => Action::WaitForFrame {
            frame: r.u16().map_err(malformed)?,
            skip: r.u8().map_err(malformed)?,
        },
        0x8B => Action::SetTarget(r.cstring().map_err(malformed)?),
        0x8C => Action::GotoLabel(r.cstring().map_err(malformed)?),
        0x8D => Action::WaitForFrame2 {
            skip: r.u8().map_err(malformed)?,
        },
        0x8E => Action::DefineFunction(decode_function2(&mut r).map_err(malformed)?),
        0x94 => Action::With {
            block_len: r.u16().map_err(malformed)?,
        },
        0x96 => Action::Push(decode_push(&mut r, offset)?),
        0x99 => Action::Jump(r.i16().map_err(malformed)?),
        0x9A => Action::GetUrl2 {
            flags: r.u8().map_err(malformed)?,
        },
        0x9B => Action::DefineFunction(decode_function(&mut r).map_err(malformed)?),
        0x9D => Action::If(r.i16().map_err(malformed)?),
        0x9E => Action::Call,
        0x9F => {
            let flags = r.u8().map_err(malformed)?;
            let scene_bias = if flags & 0x02 != 0 {
                r.u16().map_err(malformed)?
            } else {
                0
            };
            Action::GotoFrame2 {
                play: flags & 0x01 != 0,
                scene_bias,
            }
        }
        other => Action::Unknown(other),
    };
    Ok(action)
}

fn decode_function(r: &mut ByteReader<'_>) -> Result<FunctionDef, ReadError> {
    let name = r.cstring()?;
    let count = r.u16()?;
    let mut params = Vec::with_capacity(count as usize);
    for _ in 0..count {
        params.push(FunctionParam {
            register: 0,
            name: r.cstring()?,
        });
    }
    let body_len = r.u16()?;
    Ok(FunctionDef {
        name,
        params,
        register_count: 0,
        flags: FunctionFlags::default(),
        is_function2: false,
        body_len,
    })
}

fn decode_function2(r: &mut ByteReader<'_>) -> Result<FunctionDef, ReadError> {
    let name = r.cstring()?;
    let count = r.u16()?;
    let register_count = r.u8()?;
    let flags = FunctionFlags(r.u16()?);
    let mut params = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let register = r.u8()?;
        params.push(FunctionParam {
            register,
            name: r.cstring()?,
        });
    }
    let body_len = r.u16()?;
    Ok(FunctionDef {
        name,
        params,
        register_count,
        flags,
        is_function2: true,
        body_len,
    })
}

fn decode_push(r: &mut ByteReader<'_>, offset: usize) -> Result<Vec<PushValue>, ActionError> {
    let malformed = |source: ReadError| ActionError::Malformed {
        name: "push",
        offset,
        source,
    };
    let mut values = Vec::new();
    while !r.is_empty() {
        let tag = r.u8().map_err(malformed)?;
        let value = match tag {
            0 => PushValue::Str(r.cstring().map_err(malformed)?),
            1 => PushValue::Float(r.f32().map_err(malformed)?),
            2 => PushValue::Null,
            3 => PushValue::Undefined,
            4 => PushValue::Register(r.u8().map_err(malformed)?),
            5 => PushValue::Bool(r.u8().map_err(malformed)? != 0),
            6 => {
                // High 32-bit word first, each word little-endian.
                let hi = r.u32().map_err(malformed)? as u64;
                let lo = r.u32().map_err(malformed)? as u64;
                PushValue::Double(f64::from_bits((hi << 32) | lo))
            }
            7 => PushValue::Int(r.i32().map_err(malformed)?),
            8 => PushValue::Constant8(r.u8().map_err(malformed)?),
            9 => PushValue::Constant16(r.u16().map_err(malformed)?),
            tag => return Err(ActionError::BadPushType { tag, offset }),
        };
        values.push(value);
    }
    Ok(values)
}

fn mnemonic_for(opcode: u8) -> &'static str {
    match opcode {
        0x81 => "gotoframe",
        0x83 => "geturl",
        0x87 => "store_register",
        0x88 => "constant_pool",
        0x8A => "waitforframe",
        0x8B => "settarget",
        0x8C => "gotolabel",
        0x8D => "waitforframe2",
        0x8E => "function2",
        0x94 => "with",
        0x96 => "push",
        0x99 => "jump",
        0x9A => "geturl2",
        0x9B => "function",
        0x9D => "if",
        0x9E => "callframe",
        0x9F => "gotoframe2",
        _ => "action",
    }
}

impl fmt::Display for PushValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushValue::Str(s) => write!(f, "{:?}", s),
            PushValue::Float(n) => write!(f, "{}f", n),
            PushValue::Null => write!(f, "null"),
            PushValue::Undefined => write!(f, "undefined"),
            PushValue::Register(r) => write!(f, "r{}", r),
            PushValue::Bool(b) => write!(f, "{}", b),
            PushValue::Double(n) => write!(f, "{}", n),
            PushValue::Int(n) => write!(f, "{}", n),
            PushValue::Constant8(i) => write!(f, "c{}", i),
            PushValue::Constant16(i) => write!(f, "c{}", i),
        }
    }
}

/// Disassembly text, one record per line.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::GotoFrame(frame) => write!(f, "gotoframe {}", frame),
            Action::GetUrl { url, target } => write!(f, "geturl {:?} {:?}", url, target),
            Action::StoreRegister(r) => write!(f, "store_register r{}", r),
            Action::ConstantPool(pool) => write!(f, "constant_pool [{} entries]", pool.len()),
            Action::WaitForFrame { frame, skip } => write!(f, "waitforframe {} {}", frame, skip),
            Action::SetTarget(path) => write!(f, "settarget {:?}", path),
            Action::GotoLabel(label) => write!(f, "gotolabel {:?}", label),
            Action::WaitForFrame2 { skip } => write!(f, "waitforframe2 {}", skip),
            Action::DefineFunction(def) => {
                let kind = if def.is_function2 { "function2" } else { "function" };
                let names: Vec<&str> = def.params.iter().map(|p| p.name.as_str()).collect();
                write!(
                    f,
                    "{} {:?}({}) len={}",
                    kind,
                    def.name,
                    names.join(", "),
                    def.body_len
                )
            }
            Action::With { block_len } => write!(f, "with len={}", block_len),
            Action::Push(values) => {
                write!(f, "push")?;
                for (i, v) in values.iter().enumerate() {
                    write!(f, "{}{}", if i == 0 { " " } else { ", " }, v)?;
                }
                Ok(())
            }
            Action::Jump(offset) => write!(f, "jump {:+}", offset),
            Action::GetUrl2 { flags } => write!(f, "geturl2 0x{:02X}", flags),
            Action::If(offset) => write!(f, "if {:+}", offset),
            Action::Call => write!(f, "callframe"),
            Action::GotoFrame2 { play, scene_bias } => {
                write!(f, "gotoframe2 play={} bias={}", play, scene_bias)
            }
            Action::Unknown(op) => write!(f, "unknown 0x{:02X}", op),
            simple => write!(f, "{}", format!("{:?}", simple).to_lowercase()),
        }
    }
}
