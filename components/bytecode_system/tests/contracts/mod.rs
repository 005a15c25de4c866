//! Contract test runner for bytecode_system

mod test_contract_compliance;
