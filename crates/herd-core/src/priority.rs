//! Priority and retry-attempt bounds for work items.

use crate::config::{Bounds, QueueConfig};
use crate::{Error, Result};

/// Validates priorities against the configured queue range.
///
/// Constructing a policy checks the range once, so a policy that exists is
/// always well formed and can be shared across threads by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityPolicy {
    bounds: Bounds<i32>,
}

impl PriorityPolicy {
    pub fn new(min: i32, max: i32) -> Result<Self> {
        let bounds = Bounds::new(min, max);
        bounds.check("queue.priority")?;
        Ok(Self { bounds })
    }

    pub fn from_config(config: &QueueConfig) -> Result<Self> {
        Self::new(config.priority.min, config.priority.max)
    }

    pub fn min(&self) -> i32 {
        self.bounds.min
    }

    pub fn max(&self) -> i32 {
        self.bounds.max
    }

    pub fn validate_priority(&self, value: i32) -> Result<i32> {
        if self.bounds.contains(value) {
            return Ok(value);
        }
        Err(Error::validation(
            "priority",
            format!("must be between {} and {}", self.bounds.min, self.bounds.max),
        ))
    }

    /// Attempts are either unset or a positive count.
    pub fn validate_attempts(&self, value: Option<i32>) -> Result<Option<i32>> {
        match value {
            Some(n) if n <= 0 => Err(Error::validation(
                "attempts",
                format!("must be greater than zero, got {n}"),
            )),
            other => Ok(other),
        }
    }
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        let config = QueueConfig::default();
        Self {
            bounds: config.priority,
        }
    }
}
