//! ReelBatch Common Utilities
//!
//! Shared infrastructure for all ReelBatch crates:
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Configuration loading and named render defaults

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
