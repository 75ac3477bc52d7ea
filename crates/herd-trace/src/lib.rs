//! Logging initialisation for herd processes.
//!
//! Library crates only emit `tracing` events; binaries and test harnesses
//! call [`init_logging`] once at startup to decide where they go.

pub mod logging;

pub use logging::{LogFormat, LoggingConfig, LoggingError, init_logging};
