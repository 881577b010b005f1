// Unit tests for tempinbox
// This module organizes all unit tests

pub mod message_keys;
