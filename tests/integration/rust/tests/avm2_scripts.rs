//! ABC Loading and AVM2 Execution Tests
//!
//! Builds ABC files byte by byte, loads them into a player and checks what
//! the scripts trace.

use core_types::ErrorKind;
use integration_tests::{recording_player, AbcBuilder, Code, ExceptionSpec, TraitSpec};
use interpreter::{PlayerConfig, PlayerError};

fn script_error(error: PlayerError) -> ErrorKind {
    match error {
        PlayerError::Script(error) => error.kind,
        other => panic!("expected a script error, got {:?}", other),
    }
}

/// Test: entry script traces a string
#[test]
fn test_entry_script_traces() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let hi = abc.string("hi");
    let init = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .trace(trace, |c| c.push_string(hi))
            .return_void(),
    );
    abc.script(init, vec![]);

    player.load_abc(&abc.finish()).unwrap();
    assert_eq!(sink.lines(), vec!["hi"]);
    assert_eq!(player.runtime().domain().script_count(), 1);
}

/// Test: a name declared by another script runs that script first
#[test]
fn test_other_script_initializes_on_first_use() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let shared = abc.qname("shared");

    let library = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .get_local(0)
            .push_byte(42)
            .set_property(shared)
            .return_void(),
    );
    abc.script(library, vec![TraitSpec::Slot { name: shared, slot_id: 0 }]);

    let entry = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .trace(trace, |c| c.get_lex(shared))
            .return_void(),
    );
    abc.script(entry, vec![]);

    player.load_abc(&abc.finish()).unwrap();
    assert_eq!(sink.lines(), vec!["42"]);
    assert_eq!(player.runtime().domain().script_count(), 2);
}

/// Test: class with an instance slot, constructor and method
#[test]
fn test_class_construct_and_call() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let value = abc.qname("value");
    let greet = abc.qname("greet");
    let greeter = abc.qname("Greeter");

    let iinit = abc.method(
        "Greeter",
        0,
        Code::new()
            .get_local(0)
            .push_byte(5)
            .set_property(value)
            .return_void(),
    );
    let greet_method = abc.method(
        "greet",
        0,
        Code::new()
            .trace(trace, |c| c.get_local(0).get_property(value).push_byte(1).add())
            .return_void(),
    );
    let cinit = abc.method("", 0, Code::new().return_void());
    let class = abc.class(
        "Greeter",
        None,
        iinit,
        cinit,
        vec![
            TraitSpec::Slot { name: value, slot_id: 0 },
            TraitSpec::Method { name: greet, method: greet_method },
        ],
        vec![],
    );

    let entry = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .get_local(0)
            .push_null()
            .new_class(class)
            .init_property(greeter)
            .find_prop_strict(greeter)
            .construct_prop(greeter, 0)
            .call_prop_void(greet, 0)
            .return_void(),
    );
    abc.script(entry, vec![TraitSpec::Class { name: greeter, class }]);

    player.load_abc(&abc.finish()).unwrap();
    assert_eq!(sink.lines(), vec!["6"]);
    assert!(player.runtime().domain().class("Greeter").is_some());
}

/// Test: derived class runs the base initializer and inherits methods
#[test]
fn test_subclass_construct_super_and_inherited_method() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let hello = abc.qname("hello");
    let base = abc.qname("Base");
    let derived = abc.qname("Derived");
    let base_init_text = abc.string("base init");
    let hello_text = abc.string("hello");

    let base_iinit = abc.method(
        "Base",
        0,
        Code::new()
            .trace(trace, |c| c.push_string(base_init_text))
            .return_void(),
    );
    let hello_method = abc.method(
        "hello",
        0,
        Code::new()
            .trace(trace, |c| c.push_string(hello_text))
            .return_void(),
    );
    let empty_cinit = abc.method("", 0, Code::new().return_void());
    let base_class = abc.class(
        "Base",
        None,
        base_iinit,
        empty_cinit,
        vec![TraitSpec::Method { name: hello, method: hello_method }],
        vec![],
    );
    let derived_iinit = abc.method(
        "Derived",
        0,
        Code::new().get_local(0).construct_super(0).return_void(),
    );
    let derived_class = abc.class("Derived", Some("Base"), derived_iinit, empty_cinit, vec![], vec![]);

    let entry = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .get_local(0)
            .push_null()
            .new_class(base_class)
            .init_property(base)
            .get_local(0)
            .get_lex(base)
            .new_class(derived_class)
            .init_property(derived)
            .find_prop_strict(derived)
            .construct_prop(derived, 0)
            .call_prop_void(hello, 0)
            .return_void(),
    );
    abc.script(
        entry,
        vec![
            TraitSpec::Class { name: base, class: base_class },
            TraitSpec::Class { name: derived, class: derived_class },
        ],
    );

    player.load_abc(&abc.finish()).unwrap();
    assert_eq!(sink.lines(), vec!["base init", "hello"]);
}

/// Test: instance getter runs on property read
#[test]
fn test_getter_trait() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let answer = abc.qname("answer");
    let holder = abc.qname("Holder");

    let iinit = abc.method("Holder", 0, Code::new().return_void());
    let getter = abc.method("answer", 0, Code::new().push_byte(42).return_value());
    let cinit = abc.method("", 0, Code::new().return_void());
    let class = abc.class(
        "Holder",
        None,
        iinit,
        cinit,
        vec![TraitSpec::Getter { name: answer, method: getter }],
        vec![],
    );
    let entry = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .get_local(0)
            .push_null()
            .new_class(class)
            .init_property(holder)
            .trace(trace, |c| {
                c.find_prop_strict(holder)
                    .construct_prop(holder, 0)
                    .get_property(answer)
            })
            .return_void(),
    );
    abc.script(entry, vec![TraitSpec::Class { name: holder, class }]);

    player.load_abc(&abc.finish()).unwrap();
    assert_eq!(sink.lines(), vec!["42"]);
}

/// Test: thrown value lands in the catch-all handler
#[test]
fn test_throw_caught_by_handler() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let boom = abc.string("boom");

    let code = Code::new().get_local(0).push_scope();
    let from = code.len();
    let code = code.push_string(boom).throw();
    let to = code.len();
    let handler = Code::new()
        .set_local(1)
        .get_local(0)
        .push_scope()
        .trace(trace, |c| c.get_local(1));
    let code = code.jump(handler.len() as i32);
    let target = code.len();
    let code = code.append(handler).return_void();

    let init = abc.method("", 0, code);
    abc.exception(
        init,
        ExceptionSpec {
            from,
            to,
            target,
            type_name: 0,
            var_name: 0,
        },
    );
    abc.script(init, vec![]);

    player.load_abc(&abc.finish()).unwrap();
    assert_eq!(sink.lines(), vec!["boom"]);
}

/// Test: a reference error is caught as an Error and carries its name
#[test]
fn test_reference_error_caught_as_error() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let missing = abc.qname("missing");
    let name = abc.qname("name");
    let error = abc.qname("Error");

    let code = Code::new().get_local(0).push_scope();
    let from = code.len();
    let code = code.find_prop_strict(missing).pop();
    let to = code.len();
    let handler = Code::new()
        .set_local(1)
        .get_local(0)
        .push_scope()
        .trace(trace, |c| c.get_local(1).get_property(name));
    let code = code.jump(handler.len() as i32);
    let target = code.len();
    let code = code.append(handler).return_void();

    let init = abc.method("", 0, code);
    abc.exception(
        init,
        ExceptionSpec {
            from,
            to,
            target,
            type_name: error,
            var_name: 0,
        },
    );
    abc.script(init, vec![]);

    player.load_abc(&abc.finish()).unwrap();
    assert_eq!(sink.lines(), vec!["ReferenceError"]);
}

/// Test: a handler for another type lets the error escape
#[test]
fn test_unmatched_handler_propagates() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let string_type = abc.qname("String");

    let code = Code::new().get_local(0).push_scope();
    let from = code.len();
    let code = code.push_byte(7).throw();
    let to = code.len();
    let target = code.len();
    let code = code
        .set_local(1)
        .trace(trace, |c| c.get_local(1))
        .return_void();

    let init = abc.method("", 0, code);
    abc.exception(
        init,
        ExceptionSpec {
            from,
            to,
            target,
            type_name: string_type,
            var_name: 0,
        },
    );
    abc.script(init, vec![]);

    let error = player.load_abc(&abc.finish()).unwrap_err();
    assert!(matches!(script_error(error), ErrorKind::Thrown(_)));
    assert!(sink.lines().is_empty());
}

/// Test: an unknown name without a handler surfaces as a reference error
#[test]
fn test_uncaught_reference_error() {
    let (mut player, _) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let missing = abc.qname("missing");
    let init = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .get_lex(missing)
            .pop()
            .return_void(),
    );
    abc.script(init, vec![]);

    let error = player.load_abc(&abc.finish()).unwrap_err();
    assert_eq!(script_error(error), ErrorKind::ReferenceError);
}

/// Test: an unimplemented opcode aborts only its method
#[test]
fn test_unimplemented_opcode_aborts_method() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let trace = abc.qname("trace");
    let before = abc.string("before");
    let after = abc.string("after");
    let init = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .trace(trace, |c| c.push_string(before))
            // callmethod 0, 0
            .raw(&[0x43, 0x00, 0x00])
            .trace(trace, |c| c.push_string(after))
            .return_void(),
    );
    abc.script(init, vec![]);

    player.load_abc(&abc.finish()).unwrap();
    assert_eq!(sink.lines(), vec!["before"]);
}

/// Test: unbounded recursion stops at the configured depth
#[test]
fn test_recursion_limit() {
    let config = PlayerConfig::default().with_max_call_depth(32);
    let (mut player, _) = recording_player(config);
    let mut abc = AbcBuilder::new();
    let f = abc.qname("f");
    let body = abc.method(
        "f",
        0,
        Code::new().find_prop_strict(f).call_prop_void(f, 0).return_void(),
    );
    let init = abc.method(
        "",
        0,
        Code::new()
            .get_local(0)
            .push_scope()
            .get_local(0)
            .new_function(body)
            .set_property(f)
            .find_prop_strict(f)
            .call_prop_void(f, 0)
            .return_void(),
    );
    abc.script(init, vec![]);

    let error = player.load_abc(&abc.finish()).unwrap_err();
    assert_eq!(script_error(error), ErrorKind::CallDepthExceeded);
    assert!(player.runtime().call_stack().is_empty());
}

/// Test: truncated ABC data is rejected before anything runs
#[test]
fn test_truncated_abc_rejected() {
    let (mut player, sink) = recording_player(PlayerConfig::default());
    let mut abc = AbcBuilder::new();
    let init = abc.method("", 0, Code::new().return_void());
    abc.script(init, vec![]);
    let bytes = abc.finish();

    let error = player.load_abc(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(error, PlayerError::Abc(_)));
    assert!(sink.lines().is_empty());
    assert_eq!(player.runtime().domain().script_count(), 0);
}
