//! # Integration Tests
//!
//! Drives the multiplexer through the in-memory channel against the
//! loopback dispatcher, with the inbound pump running as it does in the
//! runtime.

pub mod concurrency;
pub mod flows;
