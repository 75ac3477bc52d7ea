//! Test infrastructure for herd.
//!
//! Provides an in-memory persistence adapter implementing the
//! `herd_core::ports` traits, fixtures that generate entities at the edges
//! of the configured bounds, and a shared test context.
//!
//! # Usage
//!
//! ```ignore
//! use herd_tests::TestContext;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::new();
//!     // Use ctx.store, ctx.policies, etc.
//! }
//! ```

pub mod context;
pub mod fixtures;
pub mod memory;

pub use context::TestContext;
pub use fixtures::*;
pub use memory::MemoryStore;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    let config = herd_trace::LoggingConfig {
        level: "warn,herd_core=debug".to_string(),
        ..Default::default()
    };
    let Ok(filter) = config.env_filter() else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
