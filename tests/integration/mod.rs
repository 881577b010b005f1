// Integration tests for the inbound webhook
// This module organizes all integration tests

pub mod common;
pub mod concurrent_delivery;
