//! Contract test runner for memory_manager

mod api_contract;
