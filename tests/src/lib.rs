//! # Worker Bridge Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Multiplexer + loopback dispatcher end to end
//!     ├── flows.rs      # call, lifecycle and pub/sub flows
//!     └── concurrency.rs# interleaved calls and fan-out under load
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bridge-tests
//! cargo test -p bridge-tests integration::concurrency
//!
//! # Benchmarks
//! cargo bench -p bridge-tests
//! ```

pub mod integration;
