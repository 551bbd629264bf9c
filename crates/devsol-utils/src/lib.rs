//! # devsol Utilities
//!
//! Shared logging setup for the devsol workspace.
//!
//! Library crates only emit `tracing` events; binaries call one of the
//! `init_logging*` functions once at startup and keep the returned guard.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_with_config, init_logging_with_level, LogFormat, LogLevel, LoggingConfig, LoggingError,
    LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};
