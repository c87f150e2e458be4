//! Common test utilities and mocks for integration tests

pub mod mocks;
