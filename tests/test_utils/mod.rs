//! Test Utilities
//!
//! Fixtures and mocks shared by the integration tests. Process-level tests
//! run a real interactive bash standing in for Topaz.

#![allow(dead_code, unused_imports)]

pub mod fixtures;

pub use fixtures::{bash_config, bash_spec, write_executable, PNG_BYTES, STEADY_PROMPT};
pub use mock_sink::RecordingSink;
