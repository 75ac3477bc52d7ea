//! Test context bundling policies and an in-memory store.

use crate::memory::MemoryStore;
use herd_core::config::{FarmConfig, FarmPolicies};
use std::sync::Arc;

pub struct TestContext {
    pub config: FarmConfig,
    pub policies: FarmPolicies,
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    /// Context with default bounds.
    pub fn new() -> Self {
        Self::with_config(FarmConfig::default()).expect("default config is valid")
    }

    /// Context built the way a process starts: validate, then derive policies.
    pub fn with_config(config: FarmConfig) -> anyhow::Result<Self> {
        crate::init_test_logging();

        config.validate()?;
        let policies = config.policies()?;
        Ok(Self {
            config,
            policies,
            store: Arc::new(MemoryStore::new()),
        })
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
