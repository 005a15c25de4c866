//! Execution environment for AVM1 code

use arrayvec::ArrayVec;
use core_types::{ObjectId, ScriptError, ScriptResult, ScriptVersion, Value};
use memory_manager::PropFlags;
use std::sync::Arc;

use crate::runtime::Runtime;

/// Deepest `with` nesting a buffer may use.
pub const MAX_WITH_DEPTH: usize = 8;

/// Size of the register bank shared by non-`function2` code.
pub const GLOBAL_REGISTER_COUNT: usize = 4;

/// An object pushed by `with`, live until the block ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithEntry {
    /// Scope object
    pub object: ObjectId,
    /// Buffer offset where the block ends
    pub block_end: usize,
}

/// Per-activation state of the AVM1 machine.
///
/// Holds the operand stack, the `with` stack, the registers, the activation
/// object that stores declared locals, the closure's captured scope, and the
/// target clip relative paths resolve against.
///
/// # Examples
///
/// ```
/// use interpreter::Environment;
/// use core_types::{ScriptVersion, Value};
///
/// let mut env = Environment::new(None, ScriptVersion::DEFAULT);
/// env.push(Value::Number(1.0));
/// assert_eq!(env.pop().unwrap(), Value::Number(1.0));
/// assert!(env.pop().is_err());
///
/// env.set_register(2, Value::from("r2"));
/// assert_eq!(env.get_register(2), Value::from("r2"));
/// assert_eq!(env.get_register(9), Value::Undefined);
/// ```
#[derive(Debug, Clone)]
pub struct Environment {
    stack: Vec<Value>,
    with_stack: ArrayVec<WithEntry, MAX_WITH_DEPTH>,
    global_registers: [Value; GLOBAL_REGISTER_COUNT],
    local_registers: Option<Vec<Value>>,
    register_names: Vec<(String, u8)>,
    activation: Option<ObjectId>,
    scope: Vec<ObjectId>,
    target: Option<ObjectId>,
    original_target: Option<ObjectId>,
    this: Value,
    super_object: Option<ObjectId>,
    super_base: Option<ObjectId>,
    constants: Arc<[String]>,
    version: ScriptVersion,
}

impl Environment {
    /// A fresh environment targeting `target`.
    pub fn new(target: Option<ObjectId>, version: ScriptVersion) -> Self {
        Self {
            stack: Vec::with_capacity(32),
            with_stack: ArrayVec::new(),
            global_registers: Default::default(),
            local_registers: None,
            register_names: Vec::new(),
            activation: None,
            scope: Vec::new(),
            target,
            original_target: target,
            this: target.map(Value::Object).unwrap_or_default(),
            super_object: None,
            super_base: None,
            constants: Arc::from(Vec::new()),
            version,
        }
    }

    /// Document version for coercions.
    pub fn version(&self) -> ScriptVersion {
        self.version
    }

    // ------------------------------------------------------------------
    // Operand stack
    // ------------------------------------------------------------------

    /// Pushes a value.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops a value; an empty stack is a malformed-code error.
    pub fn pop(&mut self) -> ScriptResult<Value> {
        self.stack.pop().ok_or_else(ScriptError::stack_underflow)
    }

    /// Pops `n` values, returned bottom-first.
    pub fn pop_n(&mut self, n: usize) -> ScriptResult<Vec<Value>> {
        if n > self.stack.len() {
            return Err(ScriptError::stack_underflow());
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    /// Top of stack.
    pub fn peek(&self) -> ScriptResult<&Value> {
        self.stack.last().ok_or_else(ScriptError::stack_underflow)
    }

    /// Stack contents, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Number of values on the stack.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Swaps the two topmost values.
    pub fn swap_top(&mut self) -> ScriptResult<()> {
        let len = self.stack.len();
        if len < 2 {
            return Err(ScriptError::stack_underflow());
        }
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    // ------------------------------------------------------------------
    // With stack
    // ------------------------------------------------------------------

    /// Enters a `with` block. Returns false when nesting is exhausted.
    pub fn with_push(&mut self, object: ObjectId, block_end: usize) -> bool {
        self.with_stack
            .try_push(WithEntry { object, block_end })
            .is_ok()
    }

    /// Leaves the innermost `with` block.
    pub fn with_pop(&mut self) -> Option<WithEntry> {
        self.with_stack.pop()
    }

    /// Leaves every block that ends at or before `pc`.
    pub fn unwind_with(&mut self, pc: usize) {
        while self.with_stack.last().is_some_and(|e| e.block_end <= pc) {
            self.with_stack.pop();
        }
    }

    /// `with` objects, innermost first.
    pub fn with_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.with_stack.iter().rev().map(|e| e.object)
    }

    // ------------------------------------------------------------------
    // Registers
    // ------------------------------------------------------------------

    /// Gives this activation its own register bank (`function2`).
    pub fn set_local_registers(&mut self, count: usize) {
        self.local_registers = Some(vec![Value::Undefined; count]);
    }

    /// The bank in use has `index`.
    pub fn has_register(&self, index: usize) -> bool {
        match &self.local_registers {
            Some(bank) => index < bank.len(),
            None => index < GLOBAL_REGISTER_COUNT,
        }
    }

    /// Reads a register; out-of-range reads are undefined.
    pub fn get_register(&self, index: usize) -> Value {
        let bank: &[Value] = match &self.local_registers {
            Some(bank) => bank,
            None => &self.global_registers,
        };
        bank.get(index).cloned().unwrap_or_default()
    }

    /// Writes a register. Returns false when out of range.
    pub fn set_register(&mut self, index: usize, value: Value) -> bool {
        let bank: &mut [Value] = match &mut self.local_registers {
            Some(bank) => bank,
            None => &mut self.global_registers,
        };
        match bank.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Binds a parameter name to a register.
    pub fn bind_register_name(&mut self, name: &str, register: u8) {
        self.register_names.push((name.to_string(), register));
    }

    /// Register bound to a parameter name.
    pub fn register_for_name(&self, name: &str) -> Option<u8> {
        self.register_names
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, r)| *r)
    }

    // ------------------------------------------------------------------
    // Locals, scope, target
    // ------------------------------------------------------------------

    /// Activation object holding declared locals.
    pub fn activation(&self) -> Option<ObjectId> {
        self.activation
    }

    /// Installs the activation object.
    pub fn set_activation(&mut self, activation: Option<ObjectId>) {
        self.activation = activation;
    }

    /// Captured scope chain, outermost first.
    pub fn scope(&self) -> &[ObjectId] {
        &self.scope
    }

    /// Installs the captured scope chain.
    pub fn set_scope(&mut self, scope: Vec<ObjectId>) {
        self.scope = scope;
    }

    /// Scope a closure defined here captures: the captured chain plus this
    /// activation.
    pub fn closure_scope(&self) -> Vec<ObjectId> {
        let mut scope = self.scope.clone();
        scope.extend(self.activation);
        scope
    }

    /// Current target clip or object.
    pub fn target(&self) -> Option<ObjectId> {
        self.target
    }

    /// Switches the target (`settarget`).
    pub fn set_target(&mut self, target: Option<ObjectId>) {
        self.target = target;
    }

    /// Target the environment was created with.
    pub fn original_target(&self) -> Option<ObjectId> {
        self.original_target
    }

    /// Undoes any `settarget`.
    pub fn restore_target(&mut self) {
        self.target = self.original_target;
    }

    /// Receiver of the running function.
    pub fn this(&self) -> &Value {
        &self.this
    }

    /// Sets the receiver.
    pub fn set_this(&mut self, this: Value) {
        self.this = this;
    }

    /// Object standing for `super`.
    pub fn super_object(&self) -> Option<ObjectId> {
        self.super_object
    }

    /// Sets the `super` object.
    pub fn set_super_object(&mut self, super_object: Option<ObjectId>) {
        self.super_object = super_object;
    }

    /// Prototype the running method was found on; `super` starts one
    /// link above it.
    pub fn super_base(&self) -> Option<ObjectId> {
        self.super_base
    }

    /// Sets the prototype `super` is derived from.
    pub fn set_super_base(&mut self, base: Option<ObjectId>) {
        self.super_base = base;
    }

    /// Declares a local variable: a member of the activation object, or of
    /// the target outside functions.
    pub fn declare_local(&self, rt: &mut Runtime, name: &str, value: Value) -> ScriptResult<()> {
        match self.activation {
            Some(activation) => {
                rt.heap_mut()
                    .define_member(activation, name, value, PropFlags::NONE);
            }
            None => {
                let holder = self.target.unwrap_or_else(|| rt.global());
                rt.set_member(&Value::Object(holder), name, value)?;
            }
        }
        Ok(())
    }

    /// Assigns `name` if it is a local of this activation. Returns false
    /// when it is not.
    pub fn set_local(&self, rt: &mut Runtime, name: &str, value: Value) -> bool {
        let Some(activation) = self.activation else {
            return false;
        };
        if !rt.heap().get(activation).is_some_and(|o| o.has_own(name)) {
            return false;
        }
        rt.heap_mut().put_member(activation, name, value);
        true
    }

    /// Constant pool for dictionary pushes.
    pub fn constants(&self) -> &Arc<[String]> {
        &self.constants
    }

    /// Replaces the constant pool (`constantpool`).
    pub fn set_constants(&mut self, constants: Arc<[String]>) {
        self.constants = constants;
    }

    /// Resolves a target path against the current target.
    ///
    /// Accepts slash paths (`/a/b`, `../c`, `.`) and dot paths
    /// (`_root.a`, `_parent.b`). Path segments name child clips or
    /// object-valued members.
    pub fn resolve_target(&self, rt: &Runtime, path: &str) -> Option<ObjectId> {
        let base = self.target.or_else(|| rt.root());
        if path.is_empty() {
            return base;
        }
        let (mut current, rest) = match path.strip_prefix('/') {
            Some(rest) => (rt.root()?, rest),
            None => (base?, path),
        };
        let separator = if rest.contains('/') || rest == ".." {
            '/'
        } else {
            '.'
        };
        let segments: Vec<&str> = if separator == '.' && rest == "." {
            vec!["."]
        } else {
            rest.split(separator).collect()
        };
        for segment in segments {
            current = match segment {
                "" | "." => current,
                ".." => rt.display().parent(current)?,
                s if s.eq_ignore_ascii_case("this") => current,
                s if s.eq_ignore_ascii_case("_parent") => rt.display().parent(current)?,
                s if s.eq_ignore_ascii_case("_root") || s.eq_ignore_ascii_case("_level0") => {
                    rt.root()?
                }
                s if s.eq_ignore_ascii_case("_global") => rt.global(),
                name => rt.child_object(current, name)?,
            };
        }
        Some(current)
    }
}
