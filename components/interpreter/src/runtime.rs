//! Runtime state shared by both interpreters.
//!
//! [`Runtime`] owns everything one running document needs: the heap, the
//! global object, the native function registry, the display and log
//! collaborators, the interval table and the AVM2 domain. It implements the
//! object protocol on top of the raw heap: getters and setters, watches,
//! `__resolve`, clip properties, calls and construction, and the coercions
//! that need to call back into scripts (`toString`, `valueOf`).

use bytecode_system::ActionBuffer;
use core_types::{
    format_number, CodeLocation, ErrorKind, ObjectId, ScriptError, ScriptResult, ScriptVersion,
    Value,
};
use indexmap::IndexMap;
use memory_manager::{
    Callable, CollectReport, Heap, HostObject, NativeId, ObjectKind, PropFlags, ScriptObject,
    SetOutcome,
};
use tracing::{debug, warn};

use crate::avm1;
use crate::avm2::{self, Domain};
use crate::call_frame::{CallFrame, FrameKind};
use crate::config::PlayerConfig;
use crate::context::Environment;
use crate::display::{DisplayHost, StandardProperty};
use crate::event::EventId;
use crate::host::LogSink;
use crate::natives::{self, NativeCall, NativeFn};

/// Conversion preference for [`Runtime::to_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// Try `valueOf` first
    Number,
    /// Try `toString` first
    String,
}

/// Prototype objects of the built-in constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Prototypes {
    pub object: ObjectId,
    pub function: ObjectId,
    pub array: ObjectId,
    pub string: ObjectId,
    pub number: ObjectId,
    pub boolean: ObjectId,
    pub movie_clip: ObjectId,
    pub error: ObjectId,
}

impl Prototypes {
    fn ids(&self) -> [ObjectId; 8] {
        [
            self.object,
            self.function,
            self.array,
            self.string,
            self.number,
            self.boolean,
            self.movie_clip,
            self.error,
        ]
    }
}

#[derive(Clone, Copy)]
struct NativeEntry {
    name: &'static str,
    func: NativeFn,
}

impl std::fmt::Debug for NativeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEntry").field("name", &self.name).finish()
    }
}

/// A `setInterval` registration.
#[derive(Debug, Clone)]
pub(crate) struct Interval {
    pub id: u32,
    /// Function, or the receiver when `method` is set
    pub target: Value,
    pub method: Option<String>,
    pub args: Vec<Value>,
    pub period_ms: f64,
    pub elapsed_ms: f64,
}

/// Keyboard state behind the `Key` object.
#[derive(Debug, Clone)]
pub(crate) struct KeyState {
    pub down: [bool; 256],
    pub last_code: u32,
    pub last_ascii: u32,
}

impl Default for KeyState {
    fn default() -> Self {
        KeyState {
            down: [false; 256],
            last_code: 0,
            last_ascii: 0,
        }
    }
}

/// Xorshift32 generator; the same seed replays the same sequence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Xorshift(u32);

impl Xorshift {
    pub fn new(seed: u32) -> Self {
        Xorshift(if seed == 0 { 0x9E37_79B9 } else { seed })
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / (f64::from(u32::MAX) + 1.0)
    }
}

/// Per-document runtime.
#[derive(Debug)]
pub struct Runtime {
    heap: Heap,
    natives: Vec<NativeEntry>,
    global: ObjectId,
    protos: Prototypes,
    version: ScriptVersion,
    max_call_depth: usize,
    verbose: bool,
    log: Box<dyn LogSink>,
    display: Box<dyn DisplayHost>,
    call_stack: Vec<CallFrame>,
    active_watches: Vec<(ObjectId, String)>,
    pub(crate) rng: Xorshift,
    pub(crate) intervals: Vec<Interval>,
    pub(crate) next_interval_id: u32,
    pub(crate) keys: KeyState,
    pub(crate) time_ms: f64,
    pub(crate) timelines: IndexMap<ObjectId, Vec<ActionBuffer>>,
    pub(crate) pending_frames: Vec<ObjectId>,
    pub(crate) avm2: Domain,
    /// Prototype a call through a `super` object starts from; taken by the
    /// next script function entered
    pub(crate) super_base: Option<ObjectId>,
}

impl Runtime {
    /// Creates a runtime with the native library installed.
    pub fn new(config: &PlayerConfig, log: Box<dyn LogSink>, display: Box<dyn DisplayHost>) -> Self {
        let mut heap = Heap::new();
        let object = heap.register(ScriptObject::plain());
        let with_object_proto = |kind| ScriptObject::with_proto(kind, Some(object));
        let function = heap.register(with_object_proto(ObjectKind::Plain));
        let array = heap.register(with_object_proto(ObjectKind::Array(Vec::new())));
        let string = heap.register(with_object_proto(ObjectKind::Boxed(Value::from(""))));
        let number = heap.register(with_object_proto(ObjectKind::Boxed(Value::Number(0.0))));
        let boolean = heap.register(with_object_proto(ObjectKind::Boxed(Value::Boolean(false))));
        let movie_clip = heap.register(with_object_proto(ObjectKind::Plain));
        let error = heap.register(with_object_proto(ObjectKind::Plain));
        let global = heap.register(with_object_proto(ObjectKind::Plain));

        let mut rt = Runtime {
            heap,
            natives: Vec::new(),
            global,
            protos: Prototypes {
                object,
                function,
                array,
                string,
                number,
                boolean,
                movie_clip,
                error,
            },
            version: config.script_version(),
            max_call_depth: config.max_call_depth,
            verbose: config.verbose_actions,
            log,
            display,
            call_stack: Vec::new(),
            active_watches: Vec::new(),
            rng: Xorshift::new(config.random_seed),
            intervals: Vec::new(),
            next_interval_id: 1,
            keys: KeyState::default(),
            time_ms: 0.0,
            timelines: IndexMap::new(),
            pending_frames: Vec::new(),
            avm2: Domain::default(),
            super_base: None,
        };
        natives::install(&mut rt);
        rt
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The heap, mutably.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// The `_global` object.
    pub fn global(&self) -> ObjectId {
        self.global
    }

    /// Built-in prototypes.
    pub fn protos(&self) -> &Prototypes {
        &self.protos
    }

    /// Document version.
    pub fn version(&self) -> ScriptVersion {
        self.version
    }

    /// Per-instruction tracing is on.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Display collaborator.
    pub fn display(&self) -> &dyn DisplayHost {
        self.display.as_ref()
    }

    /// Display collaborator, mutably.
    pub fn display_mut(&mut self) -> &mut dyn DisplayHost {
        self.display.as_mut()
    }

    /// Replaces the log sink.
    pub fn set_log_sink(&mut self, log: Box<dyn LogSink>) {
        self.log = log;
    }

    /// The root clip.
    pub fn root(&self) -> Option<ObjectId> {
        self.display.root()
    }

    /// Scripts and classes loaded from ABC blocks.
    pub fn domain(&self) -> &Domain {
        &self.avm2
    }

    /// Running calls, outermost first.
    pub fn call_stack(&self) -> &[CallFrame] {
        &self.call_stack
    }

    /// Milliseconds of movie time elapsed.
    pub fn time_ms(&self) -> f64 {
        self.time_ms
    }

    /// Sends a line to the log sink.
    pub fn trace(&mut self, message: &str) {
        self.log.trace(message);
    }

    /// Forwards an `FSCommand:` request.
    pub fn fs_command(&mut self, command: &str, args: &str) {
        self.log.fs_command(command, args);
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Adds a native to the registry.
    pub fn register_native(&mut self, name: &'static str, func: NativeFn) -> NativeId {
        self.natives.push(NativeEntry { name, func });
        NativeId((self.natives.len() - 1) as u32)
    }

    /// Name a native was registered under.
    pub fn native_name(&self, id: NativeId) -> Option<&'static str> {
        self.natives.get(id.0 as usize).map(|n| n.name)
    }

    /// A plain object inheriting from `Object.prototype`.
    pub fn new_object(&mut self) -> ObjectId {
        self.heap
            .register(ScriptObject::with_proto(ObjectKind::Plain, Some(self.protos.object)))
    }

    /// An array inheriting from `Array.prototype`.
    pub fn new_array(&mut self, elements: Vec<Value>) -> ObjectId {
        self.heap.register(ScriptObject::with_proto(
            ObjectKind::Array(elements),
            Some(self.protos.array),
        ))
    }

    /// A host object inheriting from `proto`.
    pub fn new_host(&mut self, host: Box<dyn HostObject>, proto: Option<ObjectId>) -> ObjectId {
        self.heap
            .register(ScriptObject::with_proto(ObjectKind::Host(host), proto))
    }

    /// A script function with a fresh `prototype` object whose
    /// `constructor` points back at it.
    pub fn new_function(&mut self, callable: Callable) -> ObjectId {
        let func = self.heap.register(ScriptObject::with_proto(
            ObjectKind::Function(callable),
            Some(self.protos.function),
        ));
        let proto = self.new_object();
        self.heap
            .define_member(proto, "constructor", Value::Object(func), PropFlags::DONT_ENUM);
        self.heap
            .define_member(func, "prototype", Value::Object(proto), PropFlags::DONT_ENUM);
        func
    }

    /// A native function object.
    pub fn new_native(&mut self, name: &'static str, func: NativeFn) -> ObjectId {
        let id = self.register_native(name, func);
        self.heap.register(ScriptObject::with_proto(
            ObjectKind::Function(Callable::Native(id)),
            Some(self.protos.function),
        ))
    }

    /// An error object with `name` and `message`.
    pub fn new_error(&mut self, name: &str, message: &str) -> ObjectId {
        let error = self
            .heap
            .register(ScriptObject::with_proto(ObjectKind::Plain, Some(self.protos.error)));
        self.heap
            .define_member(error, "name", Value::from(name), PropFlags::DONT_ENUM);
        self.heap
            .define_member(error, "message", Value::from(message), PropFlags::NONE);
        error
    }

    /// A clip object placed under `parent` in the display tree.
    pub fn new_clip(&mut self, parent: Option<ObjectId>, name: &str, depth: i32) -> ObjectId {
        let clip = self
            .heap
            .register(ScriptObject::with_proto(ObjectKind::Clip, Some(self.protos.movie_clip)));
        self.display.add_clip(clip, parent, name, depth);
        clip
    }

    /// Wraps a primitive in an object; objects pass through.
    pub fn to_object(&mut self, value: &Value) -> Option<ObjectId> {
        let proto = match value {
            Value::Object(id) => return Some(*id),
            Value::String(_) => self.protos.string,
            Value::Number(_) => self.protos.number,
            Value::Boolean(_) => self.protos.boolean,
            Value::Undefined | Value::Null | Value::Property(_) => return None,
        };
        Some(
            self.heap
                .register(ScriptObject::with_proto(ObjectKind::Boxed(value.clone()), Some(proto))),
        )
    }

    // ------------------------------------------------------------------
    // Member protocol
    // ------------------------------------------------------------------

    fn is_clip(&self, id: ObjectId) -> bool {
        matches!(self.heap.get(id).map(|o| &o.kind), Some(ObjectKind::Clip))
    }

    /// Child clip or object-valued member named `name`, without running
    /// getters. Used by path resolution.
    pub fn child_object(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        if self.is_clip(parent) {
            if let Some(child) = self.display.child_by_name(parent, name) {
                return Some(child);
            }
        }
        match self.heap.lookup(parent, name) {
            Some(Value::Object(id)) => Some(id),
            _ => None,
        }
    }

    /// True if reading `name` would find something.
    pub fn has_member(&self, id: ObjectId, name: &str) -> bool {
        if self.heap.lookup(id, name).is_some() {
            return true;
        }
        self.is_clip(id)
            && (StandardProperty::from_name(name).is_some()
                || self.display.child_by_name(id, name).is_some())
    }

    /// Reads a member of any value, running getters and `__resolve`.
    pub fn get_member(&mut self, target: &Value, name: &str) -> ScriptResult<Value> {
        let proto = match target {
            Value::Object(id) => return self.get_object_member(*id, name),
            Value::String(s) => {
                if name.eq_ignore_ascii_case("length") {
                    return Ok(Value::Number(s.encode_utf16().count() as f64));
                }
                self.protos.string
            }
            Value::Number(_) => self.protos.number,
            Value::Boolean(_) => self.protos.boolean,
            Value::Undefined | Value::Null | Value::Property(_) => return Ok(Value::Undefined),
        };
        match self.heap.lookup(proto, name) {
            Some(Value::Property(accessor)) => self.run_getter(accessor.getter, target.clone()),
            Some(value) => Ok(value),
            None => Ok(Value::Undefined),
        }
    }

    /// Reads a member of an object.
    pub fn get_object_member(&mut self, id: ObjectId, name: &str) -> ScriptResult<Value> {
        let clip = self.is_clip(id);
        if clip {
            if let Some(prop) = StandardProperty::from_name(name) {
                return Ok(self.display.get_property(id, prop));
            }
            if name.eq_ignore_ascii_case("_parent") {
                return Ok(self.display.parent(id).map(Value::Object).unwrap_or_default());
            }
        }
        if name.eq_ignore_ascii_case("_root") || name.eq_ignore_ascii_case("_level0") {
            return Ok(self.root().map(Value::Object).unwrap_or_default());
        }
        if name.eq_ignore_ascii_case("_global") {
            return Ok(Value::Object(self.global));
        }
        match self.heap.lookup(id, name) {
            Some(Value::Property(accessor)) => {
                let this = Value::Object(accessor.target.unwrap_or(id));
                self.run_getter(accessor.getter, this)
            }
            Some(value) => Ok(value),
            None => {
                if clip {
                    if let Some(child) = self.display.child_by_name(id, name) {
                        return Ok(Value::Object(child));
                    }
                }
                if !name.eq_ignore_ascii_case("__resolve") {
                    if let Some(resolver) = self.heap.lookup(id, "__resolve") {
                        if self.is_callable(&resolver) {
                            return self.call_function(
                                &resolver,
                                Value::Object(id),
                                &[Value::from(name)],
                                None,
                            );
                        }
                    }
                }
                Ok(Value::Undefined)
            }
        }
    }

    fn run_getter(&mut self, getter: Option<ObjectId>, this: Value) -> ScriptResult<Value> {
        match getter {
            Some(getter) => self.call_function(&Value::Object(getter), this, &[], None),
            None => Ok(Value::Undefined),
        }
    }

    /// Writes a member. Returns whether the write was accepted.
    ///
    /// Clip properties go to the display collaborator, watches see the
    /// value first, accessors run their setter, read-only members reject.
    /// Writes to primitives are dropped.
    pub fn set_member(&mut self, target: &Value, name: &str, value: Value) -> ScriptResult<bool> {
        let Value::Object(id) = *target else {
            return Ok(false);
        };
        if self.is_clip(id) {
            if let Some(prop) = StandardProperty::from_name(name) {
                return Ok(self.display.set_property(id, prop, &value));
            }
        }

        let value = match self.heap.watch(id, name) {
            Some(watch) if !self.watch_active(id, name) => {
                let old = match self.heap.get_own(id, name) {
                    Some(Value::Property(_)) | None => Value::Undefined,
                    Some(v) => v,
                };
                self.active_watches.push((id, name.to_ascii_lowercase()));
                let result = self.call_function(
                    &Value::Object(watch.callback),
                    Value::Object(id),
                    &[Value::from(name), old, value, watch.user_data],
                    None,
                );
                self.active_watches.pop();
                result?
            }
            _ => value,
        };

        match self.heap.put_member(id, name, value.clone()) {
            SetOutcome::Stored => Ok(true),
            SetOutcome::Rejected => Ok(false),
            SetOutcome::InvokeSetter(accessor) => match accessor.setter {
                Some(setter) => {
                    let this = Value::Object(accessor.target.unwrap_or(id));
                    self.call_function(&Value::Object(setter), this, &[value], None)?;
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    fn watch_active(&self, id: ObjectId, name: &str) -> bool {
        self.active_watches
            .iter()
            .any(|(w, n)| *w == id && n.eq_ignore_ascii_case(name))
    }

    /// Enumerable names of an object and its prototype chain, own names
    /// first; clips also list their named children.
    pub fn enumerate(&self, id: ObjectId) -> Vec<String> {
        let mut names = self.heap.enumerate(id);
        for proto in self.heap.proto_chain(id) {
            for name in self.heap.enumerate(proto) {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    names.push(name);
                }
            }
        }
        if self.is_clip(id) {
            for child in self.display.children(id) {
                let name = self.display.get_property(child, StandardProperty::Name).to_string();
                if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// `value instanceof ctor`: the constructor's `prototype` is on the
    /// value's prototype chain.
    pub fn is_instance_of(&self, value: &Value, ctor: ObjectId) -> bool {
        let Some(id) = value.as_object() else {
            return false;
        };
        let Some(Value::Object(proto)) = self.heap.lookup(ctor, "prototype") else {
            return false;
        };
        self.heap.proto_chain(id).contains(&proto)
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// True for function objects and classes.
    pub fn is_callable(&self, value: &Value) -> bool {
        value
            .as_object()
            .and_then(|id| self.heap.get(id))
            .is_some_and(|o| matches!(o.kind, ObjectKind::Function(_) | ObjectKind::Class(_)))
    }

    /// Calls a function value.
    ///
    /// `env` is the caller's environment; natives may use it, script
    /// functions always run in a fresh one.
    pub fn call_function(
        &mut self,
        func: &Value,
        this: Value,
        args: &[Value],
        env: Option<&mut Environment>,
    ) -> ScriptResult<Value> {
        self.invoke(func, this, args, env, false)
    }

    fn invoke(
        &mut self,
        func: &Value,
        this: Value,
        args: &[Value],
        env: Option<&mut Environment>,
        construct: bool,
    ) -> ScriptResult<Value> {
        let Some(id) = func.as_object() else {
            return Err(ScriptError::new(
                ErrorKind::NotAFunction,
                format!("{} is not a function", func.type_name()),
            ));
        };
        let callable = match self.heap.get(id).map(|o| &o.kind) {
            Some(ObjectKind::Function(callable)) => callable.clone(),
            // Calling a class is a type coercion.
            Some(ObjectKind::Class(_)) => return Ok(args.first().cloned().unwrap_or_default()),
            _ => {
                return Err(ScriptError::new(
                    ErrorKind::NotAFunction,
                    format!("object {} is not callable", id),
                ))
            }
        };
        let frame = match &callable {
            Callable::Native(native) => CallFrame::new(
                id,
                FrameKind::Native,
                self.native_name(*native).unwrap_or("native"),
                CodeLocation::action(0),
            ),
            Callable::Action { code, .. } => CallFrame::new(
                id,
                FrameKind::Action,
                code.def.name.clone(),
                CodeLocation::action(code.start),
            ),
            Callable::Abc { abc, method, .. } => CallFrame::new(
                id,
                FrameKind::Abc,
                abc.method_name(*method),
                CodeLocation::method(*method, 0),
            ),
        };
        self.enter_frame(frame)?;
        let result = match callable {
            Callable::Native(native) => match self.natives.get(native.0 as usize).copied() {
                Some(entry) => (entry.func)(
                    self,
                    NativeCall {
                        this,
                        args,
                        env,
                        construct,
                        callee: id,
                    },
                ),
                None => Err(ScriptError::new(
                    ErrorKind::NotAFunction,
                    format!("unregistered native {}", native.0),
                )),
            },
            Callable::Action {
                code,
                scope,
                target,
            } => avm1::call_function(self, id, &code, scope, target, this, args),
            Callable::Abc {
                abc,
                method,
                scope,
                bound_this,
                class,
            } => {
                let this = bound_this.map(Value::Object).unwrap_or(this);
                avm2::call_method(self, &abc, method, &scope, this, args, class)
            }
        };
        self.leave_frame();
        result
    }

    /// Pushes a call frame, failing once the nesting limit is reached.
    /// Class initializers use this directly since no function object
    /// stands for them.
    pub(crate) fn enter_frame(&mut self, frame: CallFrame) -> ScriptResult<()> {
        if self.call_stack.len() >= self.max_call_depth {
            return Err(ScriptError::new(
                ErrorKind::CallDepthExceeded,
                format!("more than {} nested calls", self.max_call_depth),
            ));
        }
        self.call_stack.push(frame);
        Ok(())
    }

    pub(crate) fn leave_frame(&mut self) {
        self.call_stack.pop();
    }

    /// Calls `receiver[name](args)`, honouring the receiver's `this`
    /// override.
    pub fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        env: Option<&mut Environment>,
    ) -> ScriptResult<Value> {
        let func = self.get_member(receiver, name)?;
        if !self.is_callable(&func) {
            return Err(ScriptError::new(
                ErrorKind::NotAFunction,
                format!("{} is not a function", name),
            ));
        }
        let this = self.receiver_this(receiver);
        self.call_function(&func, this, args, env)
    }

    /// `this` for a call on `receiver`.
    pub fn receiver_this(&self, receiver: &Value) -> Value {
        match receiver {
            Value::Object(id) => Value::Object(
                self.heap
                    .get(*id)
                    .and_then(|o| o.this_override)
                    .unwrap_or(*id),
            ),
            other => other.clone(),
        }
    }

    /// `new ctor(args)`.
    ///
    /// Classes build through the AVM2 class protocol. Functions get a fresh
    /// object inheriting from `ctor.prototype`; a constructor that returns an
    /// object replaces it.
    pub fn construct(
        &mut self,
        ctor: &Value,
        args: &[Value],
        env: Option<&mut Environment>,
    ) -> ScriptResult<Value> {
        let Some(id) = ctor.as_object() else {
            return Err(ScriptError::new(
                ErrorKind::NotAFunction,
                format!("cannot construct {}", ctor.type_name()),
            ));
        };
        if matches!(self.heap.get(id).map(|o| &o.kind), Some(ObjectKind::Class(_))) {
            return avm2::construct_class(self, id, args).map(Value::Object);
        }
        let proto = match self.get_object_member(id, "prototype")? {
            Value::Object(p) => p,
            _ => self.protos.object,
        };
        let instance = self
            .heap
            .register(ScriptObject::with_proto(ObjectKind::Plain, Some(proto)));
        self.heap.define_member(
            instance,
            "__constructor__",
            Value::Object(id),
            PropFlags::DONT_ENUM,
        );
        let result = self.invoke(ctor, Value::Object(instance), args, env, true)?;
        Ok(match result {
            Value::Object(replacement) => Value::Object(replacement),
            _ => Value::Object(instance),
        })
    }

    /// Calls the handler for `event` on `target`, if one is defined.
    /// Returns whether a handler ran.
    pub fn on_event(&mut self, target: ObjectId, event: EventId, args: &[Value]) -> ScriptResult<bool> {
        let handler = self.get_object_member(target, event.method_name())?;
        if !self.is_callable(&handler) {
            return Ok(false);
        }
        self.call_function(&handler, Value::Object(target), args, None)?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Coercions
    // ------------------------------------------------------------------

    /// Converts an object to a primitive through `valueOf`/`toString`.
    pub fn to_primitive(&mut self, value: &Value, hint: Hint) -> ScriptResult<Value> {
        let id = match value {
            Value::Object(id) => *id,
            Value::Property(_) => return Ok(Value::Undefined),
            other => return Ok(other.clone()),
        };
        match self.heap.get(id).map(|o| &o.kind) {
            Some(ObjectKind::Boxed(inner)) => return Ok(inner.clone()),
            Some(ObjectKind::Clip) if hint == Hint::String => {
                return Ok(Value::String(self.display.dot_path(id)));
            }
            None => return Ok(Value::Undefined),
            _ => {}
        }
        let order = match hint {
            Hint::Number => ["valueOf", "toString"],
            Hint::String => ["toString", "valueOf"],
        };
        for method in order {
            let func = self.get_object_member(id, method)?;
            if self.is_callable(&func) {
                let result = self.call_function(&func, Value::Object(id), &[], None)?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Ok(Value::from(self.default_object_string(id)))
    }

    /// `[object Object]`, `[type Function]` and friends.
    pub fn default_object_string(&self, id: ObjectId) -> String {
        match self.heap.get(id).map(|o| &o.kind) {
            Some(ObjectKind::Function(_)) | Some(ObjectKind::Class(_)) => "[type Function]".into(),
            Some(ObjectKind::Clip) => self.display.dot_path(id),
            _ => "[object Object]".into(),
        }
    }

    /// String conversion honouring the document version.
    pub fn to_string_value(&mut self, value: &Value) -> ScriptResult<String> {
        let primitive = self.to_primitive(value, Hint::String)?;
        Ok(primitive.to_string_versioned(self.version))
    }

    /// Number conversion honouring the document version.
    pub fn to_number_value(&mut self, value: &Value) -> ScriptResult<f64> {
        let primitive = self.to_primitive(value, Hint::Number)?;
        Ok(primitive.to_number_versioned(self.version))
    }

    /// Boolean conversion honouring the document version.
    pub fn to_bool(&self, value: &Value) -> bool {
        value.to_bool(self.version)
    }

    /// `typeof`.
    pub fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Object(id) => match self.heap.get(*id).map(|o| &o.kind) {
                Some(ObjectKind::Function(_)) | Some(ObjectKind::Class(_)) => "function",
                Some(ObjectKind::Clip) => "movieclip",
                Some(_) => "object",
                None => "undefined",
            },
            other => other.type_name(),
        }
    }

    /// Abstract equality with object-to-primitive conversion.
    pub fn loose_equals(&mut self, a: &Value, b: &Value) -> ScriptResult<bool> {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) => Ok(x == y),
            (Value::Object(_), other) if !other.is_nullish() => {
                let primitive = self.to_primitive(a, Hint::Number)?;
                Ok(primitive.loose_equals(other))
            }
            (other, Value::Object(_)) if !other.is_nullish() => {
                let primitive = self.to_primitive(b, Hint::Number)?;
                Ok(other.loose_equals(&primitive))
            }
            _ => Ok(a.loose_equals(b)),
        }
    }

    /// `+`: concatenation if either side is a string, else numeric.
    pub fn add(&mut self, a: &Value, b: &Value) -> ScriptResult<Value> {
        let a = self.to_primitive(a, Hint::Number)?;
        let b = self.to_primitive(b, Hint::Number)?;
        if a.is_string() || b.is_string() {
            let mut s = a.to_string_versioned(self.version);
            s.push_str(&b.to_string_versioned(self.version));
            return Ok(Value::String(s));
        }
        Ok(Value::Number(
            a.to_number_versioned(self.version) + b.to_number_versioned(self.version),
        ))
    }

    /// `a < b`; undefined when either side is NaN.
    pub fn less_than(&mut self, a: &Value, b: &Value) -> ScriptResult<Value> {
        let a = self.to_primitive(a, Hint::Number)?;
        let b = self.to_primitive(b, Hint::Number)?;
        if let (Value::String(x), Value::String(y)) = (&a, &b) {
            return Ok(Value::Boolean(x < y));
        }
        let x = a.to_number_versioned(self.version);
        let y = b.to_number_versioned(self.version);
        if x.is_nan() || y.is_nan() {
            return Ok(Value::Undefined);
        }
        Ok(Value::Boolean(x < y))
    }

    /// Debug rendering used by `trace` of numbers and the CLI dump.
    pub fn describe(&mut self, value: &Value) -> String {
        match value {
            Value::Number(n) => format_number(*n),
            other => self
                .to_string_value(other)
                .unwrap_or_else(|_| other.to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Timeline
    // ------------------------------------------------------------------

    /// Installs per-frame action blocks for a clip's timeline.
    pub fn set_timeline(&mut self, clip: ObjectId, frames: Vec<ActionBuffer>) {
        self.display.set_frame_count(clip, frames.len().max(1) as u32);
        self.timelines.insert(clip, frames);
    }

    /// Moves a clip's playhead; a changed frame queues its actions.
    pub fn goto_frame(&mut self, clip: ObjectId, frame: u32, play: bool) {
        if self.display.goto_frame(clip, frame, play) {
            self.pending_frames.push(clip);
        }
    }

    /// Moves a clip's playhead to a label.
    pub fn goto_label(&mut self, clip: ObjectId, label: &str, play: bool) -> bool {
        let found = self.display.goto_label(clip, label, play);
        if found {
            self.pending_frames.push(clip);
        }
        found
    }

    /// Runs the actions of `clip`'s frame `frame` (zero-based). Faults are
    /// logged and stop only that block.
    pub fn run_frame_actions(&mut self, clip: ObjectId, frame: u32) -> bool {
        let Some(buffer) = self
            .timelines
            .get(&clip)
            .and_then(|frames| frames.get(frame as usize))
            .cloned()
        else {
            return false;
        };
        let mut env = Environment::new(Some(clip), self.version);
        match avm1::run_buffer(self, &mut env, &buffer) {
            Ok(_) => true,
            Err(error) => {
                warn!(clip = %clip, frame, %error, "frame script aborted");
                false
            }
        }
    }

    /// Runs the actions queued by script `goto`s, bounded so a script that
    /// keeps jumping cannot spin forever.
    pub fn run_pending_frames(&mut self) {
        let mut budget = 64;
        while !self.pending_frames.is_empty() && budget > 0 {
            let clips: Vec<ObjectId> = std::mem::take(&mut self.pending_frames);
            for clip in clips {
                if let Some(frame) = self.display.current_frame(clip) {
                    self.run_frame_actions(clip, frame);
                }
            }
            budget -= 1;
        }
        self.pending_frames.clear();
    }

    // ------------------------------------------------------------------
    // Intervals and clock
    // ------------------------------------------------------------------

    /// Advances the movie clock and fires due intervals.
    pub fn tick(&mut self, delta_ms: f64) {
        self.time_ms += delta_ms;
        let ids: Vec<u32> = self.intervals.iter().map(|i| i.id).collect();
        for id in ids {
            let Some(interval) = self.intervals.iter_mut().find(|i| i.id == id) else {
                continue;
            };
            interval.elapsed_ms += delta_ms;
            let period = interval.period_ms.max(1.0);
            let mut due = 0;
            while interval.elapsed_ms >= period && due < 10 {
                interval.elapsed_ms -= period;
                due += 1;
            }
            let fire = interval.clone();
            for _ in 0..due {
                let result = match &fire.method {
                    Some(method) => self.call_method(&fire.target, method, &fire.args, None),
                    None => self.call_function(&fire.target, Value::Undefined, &fire.args, None),
                };
                if let Err(error) = result {
                    warn!(interval = id, %error, "interval callback failed");
                    break;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Objects that stay alive regardless of counts: the global object,
    /// built-in prototypes, every clip on stage, interval callbacks and the
    /// AVM2 domain.
    pub fn roots(&self) -> Vec<ObjectId> {
        let mut roots = vec![self.global];
        roots.extend(self.protos.ids());
        roots.extend(self.display.clips());
        roots.extend(self.timelines.keys().copied());
        for interval in &self.intervals {
            roots.extend(interval.target.as_object());
            roots.extend(interval.args.iter().filter_map(Value::as_object));
        }
        self.avm2.roots(&mut roots);
        roots
    }

    /// Frees zero-count objects. Only safe between frames, when no script
    /// holds values on an operand stack.
    pub fn reclaim(&mut self) -> usize {
        let roots = self.roots();
        self.heap.reclaim(&roots)
    }

    /// Full cycle pass. Only safe between frames.
    pub fn collect_garbage(&mut self) -> CollectReport {
        let roots = self.roots();
        let report = self.heap.collect(&roots);
        debug!(
            freed = report.freed_by_count + report.freed_by_sweep,
            live = report.live,
            "runtime collection"
        );
        report
    }
}
