//! Unit test runner for memory_manager

mod test_collector;
mod test_properties;
