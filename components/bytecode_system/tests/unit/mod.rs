//! Unit test runner for bytecode_system

mod test_abc_parser;
mod test_action;
mod test_op;
