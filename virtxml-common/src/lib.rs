//! # virtxml Common
//!
//! Shared utilities for the virtxml workspace: tracing subscriber setup
//! used by binaries and test harnesses.

pub mod logging;

// Re-export logging functions
pub use logging::{init_logging, init_logging_json, try_init_logging};
