//! Hand assembler for action blocks used across the test targets.

#![allow(dead_code)]

pub const ADD: u8 = 0x0A;
pub const LESS: u8 = 0x0F;
pub const NOT: u8 = 0x12;
pub const POP: u8 = 0x17;
pub const GET_VARIABLE: u8 = 0x1C;
pub const SET_VARIABLE: u8 = 0x1D;
pub const TRACE: u8 = 0x26;
pub const THROW: u8 = 0x2A;
pub const RANDOM: u8 = 0x30;
pub const CALL_FUNCTION: u8 = 0x3D;
pub const RETURN: u8 = 0x3E;
pub const NEW_OBJECT: u8 = 0x40;
pub const INIT_ARRAY: u8 = 0x42;
pub const INIT_OBJECT: u8 = 0x43;
pub const TYPE_OF: u8 = 0x44;
pub const ADD2: u8 = 0x47;
pub const EQUALS2: u8 = 0x49;
pub const GET_MEMBER: u8 = 0x4E;
pub const SET_MEMBER: u8 = 0x4F;
pub const INCREMENT: u8 = 0x50;
pub const CALL_METHOD: u8 = 0x52;
pub const INSTANCE_OF: u8 = 0x54;
pub const EXTENDS: u8 = 0x69;

/// Builds one action block record by record.
#[derive(Debug, Default, Clone)]
pub struct Asm {
    code: Vec<u8>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(mut self, opcode: u8) -> Self {
        self.code.push(opcode);
        self
    }

    pub fn record(mut self, opcode: u8, payload: &[u8]) -> Self {
        self.code.push(opcode);
        self.code
            .extend_from_slice(&(payload.len() as u16).to_le_bytes());
        self.code.extend_from_slice(payload);
        self
    }

    pub fn push_str(self, s: &str) -> Self {
        let mut payload = vec![0];
        payload.extend_from_slice(s.as_bytes());
        payload.push(0);
        self.record(0x96, &payload)
    }

    pub fn push_int(self, n: i32) -> Self {
        let mut payload = vec![7];
        payload.extend_from_slice(&n.to_le_bytes());
        self.record(0x96, &payload)
    }

    /// Doubles are stored high word first.
    pub fn push_double(self, n: f64) -> Self {
        let bits = n.to_bits();
        let mut payload = vec![6];
        payload.extend_from_slice(&((bits >> 32) as u32).to_le_bytes());
        payload.extend_from_slice(&(bits as u32).to_le_bytes());
        self.record(0x96, &payload)
    }

    pub fn push_bool(self, b: bool) -> Self {
        self.record(0x96, &[5, u8::from(b)])
    }

    pub fn push_null(self) -> Self {
        self.record(0x96, &[2])
    }

    pub fn push_undefined(self) -> Self {
        self.record(0x96, &[3])
    }

    pub fn push_register(self, register: u8) -> Self {
        self.record(0x96, &[4, register])
    }

    pub fn store_register(self, register: u8) -> Self {
        self.record(0x87, &[register])
    }

    pub fn get_url(self, url: &str, target: &str) -> Self {
        let mut payload = Vec::new();
        payload.extend_from_slice(url.as_bytes());
        payload.push(0);
        payload.extend_from_slice(target.as_bytes());
        payload.push(0);
        self.record(0x83, &payload)
    }

    pub fn jump(self, offset: i16) -> Self {
        self.record(0x99, &offset.to_le_bytes())
    }

    pub fn branch_if(self, offset: i16) -> Self {
        self.record(0x9D, &offset.to_le_bytes())
    }

    /// `DefineFunction` with `body` following the record.
    pub fn function(mut self, name: &str, params: &[&str], body: Asm) -> Self {
        let mut payload = Vec::new();
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&(params.len() as u16).to_le_bytes());
        for param in params {
            payload.extend_from_slice(param.as_bytes());
            payload.push(0);
        }
        payload.extend_from_slice(&(body.code.len() as u16).to_le_bytes());
        self = self.record(0x9B, &payload);
        self.code.extend(body.code);
        self
    }

    /// `name = value` where `value` is built by `push`.
    pub fn set(self, name: &str, push: impl FnOnce(Asm) -> Asm) -> Self {
        push(self.push_str(name)).op(SET_VARIABLE)
    }

    pub fn get(self, name: &str) -> Self {
        self.push_str(name).op(GET_VARIABLE)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// The block with its end marker.
    pub fn build(mut self) -> Vec<u8> {
        self.code.push(0x00);
        self.code
    }
}
