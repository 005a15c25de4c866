//! Writes small ABC files for end-to-end tests.
//!
//! Every name lives in the public package namespace. Only the tables the
//! tests need are populated: strings, one namespace, QNames, methods with
//! bodies, classes and scripts.

/// Trait kinds the builder can emit.
#[derive(Debug, Clone)]
pub enum TraitSpec {
    /// `var name`
    Slot { name: u32, slot_id: u32 },
    /// `const name`
    Const { name: u32, slot_id: u32 },
    /// Method bound by name
    Method { name: u32, method: u32 },
    /// Getter half of an accessor
    Getter { name: u32, method: u32 },
    /// Setter half of an accessor
    Setter { name: u32, method: u32 },
    /// Class slot filled by `newclass`
    Class { name: u32, class: u32 },
}

/// One exception range of a body.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionSpec {
    pub from: u32,
    pub to: u32,
    pub target: u32,
    /// Multiname of the caught type, 0 for any
    pub type_name: u32,
    /// Multiname of the catch variable, 0 for none
    pub var_name: u32,
}

#[derive(Debug, Clone)]
struct MethodSpec {
    name: u32,
    param_count: u32,
    flags: u8,
    local_count: u32,
    code: Vec<u8>,
    exceptions: Vec<ExceptionSpec>,
}

#[derive(Debug, Clone)]
struct ClassSpec {
    name: u32,
    super_name: u32,
    iinit: u32,
    cinit: u32,
    instance_traits: Vec<TraitSpec>,
    static_traits: Vec<TraitSpec>,
}

#[derive(Debug, Clone)]
struct ScriptSpec {
    init: u32,
    traits: Vec<TraitSpec>,
}

/// Accumulates pools and definitions, then serializes them.
#[derive(Debug, Default)]
pub struct AbcBuilder {
    strings: Vec<String>,
    multinames: Vec<u32>,
    methods: Vec<MethodSpec>,
    classes: Vec<ClassSpec>,
    scripts: Vec<ScriptSpec>,
}

impl AbcBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// String pool index of `s`, adding it if needed.
    pub fn string(&mut self, s: &str) -> u32 {
        match self.strings.iter().position(|x| x == s) {
            Some(i) => i as u32 + 1,
            None => {
                self.strings.push(s.to_string());
                self.strings.len() as u32
            }
        }
    }

    /// Multiname index of the public QName `name`.
    pub fn qname(&mut self, name: &str) -> u32 {
        let string = self.string(name);
        match self.multinames.iter().position(|s| *s == string) {
            Some(i) => i as u32 + 1,
            None => {
                self.multinames.push(string);
                self.multinames.len() as u32
            }
        }
    }

    /// Adds a method and its body. Returns the method index.
    pub fn method(&mut self, name: &str, param_count: u32, code: Code) -> u32 {
        self.method_with_flags(name, param_count, 0, code)
    }

    /// Adds a method with `method_info` flag bits.
    pub fn method_with_flags(&mut self, name: &str, param_count: u32, flags: u8, code: Code) -> u32 {
        let name = self.string(name);
        self.methods.push(MethodSpec {
            name,
            param_count,
            flags,
            local_count: param_count + 4,
            code: code.bytes,
            exceptions: Vec::new(),
        });
        self.methods.len() as u32 - 1
    }

    /// Adds an exception range to `method`'s body.
    pub fn exception(&mut self, method: u32, exception: ExceptionSpec) {
        if let Some(spec) = self.methods.get_mut(method as usize) {
            spec.exceptions.push(exception);
        }
    }

    /// Adds a class. Returns the class index.
    pub fn class(
        &mut self,
        name: &str,
        super_name: Option<&str>,
        iinit: u32,
        cinit: u32,
        instance_traits: Vec<TraitSpec>,
        static_traits: Vec<TraitSpec>,
    ) -> u32 {
        let name = self.qname(name);
        let super_name = super_name.map_or(0, |s| self.qname(s));
        self.classes.push(ClassSpec {
            name,
            super_name,
            iinit,
            cinit,
            instance_traits,
            static_traits,
        });
        self.classes.len() as u32 - 1
    }

    /// Adds a script. The last one added is the entry script.
    pub fn script(&mut self, init: u32, traits: Vec<TraitSpec>) {
        self.scripts.push(ScriptSpec { init, traits });
    }

    /// Serializes the file.
    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(&46u16.to_le_bytes());

        // ints, uints, doubles
        u30(&mut out, 0);
        u30(&mut out, 0);
        u30(&mut out, 0);
        u30(&mut out, self.strings.len() as u32 + 1);
        for s in &self.strings {
            u30(&mut out, s.len() as u32);
            out.extend_from_slice(s.as_bytes());
        }
        // one public namespace named ""
        u30(&mut out, 2);
        out.push(0x16);
        u30(&mut out, 0);
        // namespace sets
        u30(&mut out, 0);
        u30(&mut out, self.multinames.len() as u32 + 1);
        for name in &self.multinames {
            out.push(0x07);
            u30(&mut out, 1);
            u30(&mut out, *name);
        }

        u30(&mut out, self.methods.len() as u32);
        for method in &self.methods {
            u30(&mut out, method.param_count);
            u30(&mut out, 0);
            for _ in 0..method.param_count {
                u30(&mut out, 0);
            }
            u30(&mut out, method.name);
            out.push(method.flags);
        }

        // metadata
        u30(&mut out, 0);

        u30(&mut out, self.classes.len() as u32);
        for class in &self.classes {
            u30(&mut out, class.name);
            u30(&mut out, class.super_name);
            out.push(0);
            u30(&mut out, 0);
            u30(&mut out, class.iinit);
            traits(&mut out, &class.instance_traits);
        }
        for class in &self.classes {
            u30(&mut out, class.cinit);
            traits(&mut out, &class.static_traits);
        }

        u30(&mut out, self.scripts.len() as u32);
        for script in &self.scripts {
            u30(&mut out, script.init);
            traits(&mut out, &script.traits);
        }

        u30(&mut out, self.methods.len() as u32);
        for (index, method) in self.methods.iter().enumerate() {
            u30(&mut out, index as u32);
            u30(&mut out, 16);
            u30(&mut out, method.local_count);
            u30(&mut out, 0);
            u30(&mut out, 8);
            u30(&mut out, method.code.len() as u32);
            out.extend_from_slice(&method.code);
            u30(&mut out, method.exceptions.len() as u32);
            for e in &method.exceptions {
                u30(&mut out, e.from);
                u30(&mut out, e.to);
                u30(&mut out, e.target);
                u30(&mut out, e.type_name);
                u30(&mut out, e.var_name);
            }
            u30(&mut out, 0);
        }
        out
    }
}

fn traits(out: &mut Vec<u8>, traits: &[TraitSpec]) {
    u30(out, traits.len() as u32);
    for tr in traits {
        match tr {
            TraitSpec::Slot { name, slot_id } | TraitSpec::Const { name, slot_id } => {
                u30(out, *name);
                out.push(if matches!(tr, TraitSpec::Slot { .. }) { 0 } else { 6 });
                u30(out, *slot_id);
                u30(out, 0);
                u30(out, 0);
            }
            TraitSpec::Method { name, method }
            | TraitSpec::Getter { name, method }
            | TraitSpec::Setter { name, method } => {
                let kind = match tr {
                    TraitSpec::Method { .. } => 1,
                    TraitSpec::Getter { .. } => 2,
                    _ => 3,
                };
                u30(out, *name);
                out.push(kind);
                u30(out, 0);
                u30(out, *method);
            }
            TraitSpec::Class { name, class } => {
                u30(out, *name);
                out.push(4);
                u30(out, 0);
                u30(out, *class);
            }
        }
    }
}

fn u30(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Emits one method body.
#[derive(Debug, Default, Clone)]
pub struct Code {
    bytes: Vec<u8>,
}

impl Code {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the next instruction.
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Appends another block, such as a handler laid out separately.
    pub fn append(mut self, other: Code) -> Self {
        self.bytes.extend(other.bytes);
        self
    }

    fn op_u30(mut self, opcode: u8, operands: &[u32]) -> Self {
        self.bytes.push(opcode);
        for operand in operands {
            u30(&mut self.bytes, *operand);
        }
        self
    }

    pub fn get_local(self, index: u8) -> Self {
        match index {
            0..=3 => self.raw(&[0xD0 + index]),
            n => self.op_u30(0x62, &[u32::from(n)]),
        }
    }

    pub fn set_local(self, index: u8) -> Self {
        match index {
            0..=3 => self.raw(&[0xD4 + index]),
            n => self.op_u30(0x63, &[u32::from(n)]),
        }
    }

    pub fn push_scope(self) -> Self {
        self.raw(&[0x30])
    }

    pub fn pop_scope(self) -> Self {
        self.raw(&[0x1D])
    }

    pub fn push_byte(self, n: i8) -> Self {
        self.raw(&[0x24, n as u8])
    }

    pub fn push_string(self, index: u32) -> Self {
        self.op_u30(0x2C, &[index])
    }

    pub fn push_null(self) -> Self {
        self.raw(&[0x20])
    }

    pub fn pop(self) -> Self {
        self.raw(&[0x29])
    }

    pub fn dup(self) -> Self {
        self.raw(&[0x2A])
    }

    pub fn add(self) -> Self {
        self.raw(&[0xA0])
    }

    pub fn find_prop_strict(self, name: u32) -> Self {
        self.op_u30(0x5D, &[name])
    }

    pub fn get_lex(self, name: u32) -> Self {
        self.op_u30(0x60, &[name])
    }

    pub fn get_property(self, name: u32) -> Self {
        self.op_u30(0x66, &[name])
    }

    pub fn set_property(self, name: u32) -> Self {
        self.op_u30(0x61, &[name])
    }

    pub fn init_property(self, name: u32) -> Self {
        self.op_u30(0x68, &[name])
    }

    pub fn call_property(self, name: u32, args: u32) -> Self {
        self.op_u30(0x46, &[name, args])
    }

    pub fn call_prop_void(self, name: u32, args: u32) -> Self {
        self.op_u30(0x4F, &[name, args])
    }

    pub fn construct_prop(self, name: u32, args: u32) -> Self {
        self.op_u30(0x4A, &[name, args])
    }

    pub fn construct_super(self, args: u32) -> Self {
        self.op_u30(0x49, &[args])
    }

    pub fn new_class(self, class: u32) -> Self {
        self.op_u30(0x58, &[class])
    }

    pub fn new_function(self, method: u32) -> Self {
        self.op_u30(0x40, &[method])
    }

    pub fn call(self, args: u32) -> Self {
        self.op_u30(0x41, &[args])
    }

    pub fn throw(self) -> Self {
        self.raw(&[0x03])
    }

    /// Unconditional branch relative to the end of the instruction.
    pub fn jump(mut self, offset: i32) -> Self {
        self.bytes.push(0x10);
        self.bytes.extend_from_slice(&offset.to_le_bytes()[..3]);
        self
    }

    pub fn return_void(self) -> Self {
        self.raw(&[0x47])
    }

    pub fn return_value(self) -> Self {
        self.raw(&[0x48])
    }

    /// `trace(<value pushed by push>)` from inside a scope that reaches the
    /// player global.
    pub fn trace(self, trace: u32, push: impl FnOnce(Code) -> Code) -> Self {
        push(self.find_prop_strict(trace)).call_prop_void(trace, 1)
    }
}
