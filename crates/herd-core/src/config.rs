//! Process-wide farm configuration.
//!
//! Bounds are read once at startup, from an optional YAML file and then from
//! `HERD_*` environment variables, and validated before any policy is built
//! from them. After that they are read-only.

use crate::priority::PriorityPolicy;
use crate::validation::AgentLimits;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// An inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy + fmt::Display> Bounds<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }

    /// Reject ranges whose minimum is above their maximum.
    pub fn check(&self, name: &str) -> Result<()> {
        if self.min > self.max {
            return Err(Error::Configuration(format!(
                "{name}: minimum {} is greater than maximum {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FarmConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Work queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Allowed job and task priorities.
    #[serde(default = "default_priority")]
    pub priority: Bounds<i32>,
}

/// Agent resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_port")]
    pub port: Bounds<i64>,
    #[serde(default = "default_cpus")]
    pub cpus: Bounds<i64>,
    /// Megabytes.
    #[serde(default = "default_ram")]
    pub ram: Bounds<i64>,
}

fn default_priority() -> Bounds<i32> {
    Bounds::new(-1000, 1000)
}

fn default_port() -> Bounds<i64> {
    Bounds::new(1024, 65535)
}

fn default_cpus() -> Bounds<i64> {
    Bounds::new(1, 256)
}

fn default_ram() -> Bounds<i64> {
    Bounds::new(16, 262_144)
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cpus: default_cpus(),
            ram: default_ram(),
        }
    }
}

impl FarmConfig {
    /// Load configuration for process startup.
    ///
    /// Reads `path` when given, applies environment overrides and validates
    /// the result. Any failure here should halt startup.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        info!(
            min_priority = config.queue.priority.min,
            max_priority = config.queue.priority.max,
            "Loaded farm configuration"
        );
        Ok(config)
    }

    /// Load configuration from a YAML file without validating it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Overlay values found through `lookup`, keyed by `HERD_*` variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| -> Result<Option<i64>> {
            match lookup(name) {
                None => Ok(None),
                Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
                    Error::Configuration(format!("{name} must be an integer, got {raw:?}"))
                }),
            }
        };

        if let Some(v) = read("HERD_QUEUE_MIN_PRIORITY")? {
            self.queue.priority.min = to_i32("HERD_QUEUE_MIN_PRIORITY", v)?;
        }
        if let Some(v) = read("HERD_QUEUE_MAX_PRIORITY")? {
            self.queue.priority.max = to_i32("HERD_QUEUE_MAX_PRIORITY", v)?;
        }

        let agent = &mut self.agent;
        for (name, slot) in [
            ("HERD_AGENT_MIN_PORT", &mut agent.port.min),
            ("HERD_AGENT_MAX_PORT", &mut agent.port.max),
            ("HERD_AGENT_MIN_CPUS", &mut agent.cpus.min),
            ("HERD_AGENT_MAX_CPUS", &mut agent.cpus.max),
            ("HERD_AGENT_MIN_RAM", &mut agent.ram.min),
            ("HERD_AGENT_MAX_RAM", &mut agent.ram.max),
        ] {
            if let Some(v) = read(name)? {
                *slot = v;
            }
        }

        Ok(())
    }

    /// Check every range. A failure is fatal for startup.
    pub fn validate(&self) -> Result<()> {
        self.queue.priority.check("queue.priority")?;
        self.agent.port.check("agent.port")?;
        self.agent.cpus.check("agent.cpus")?;
        self.agent.ram.check("agent.ram")?;
        Ok(())
    }
}

/// Validated policies derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarmPolicies {
    pub priority: PriorityPolicy,
    pub agent: AgentLimits,
}

impl FarmConfig {
    /// Build the read-only policies validators consult.
    pub fn policies(&self) -> Result<FarmPolicies> {
        Ok(FarmPolicies {
            priority: PriorityPolicy::from_config(&self.queue)?,
            agent: AgentLimits::from_config(&self.agent)?,
        })
    }
}

fn to_i32(name: &str, value: i64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::Configuration(format!("{name} is out of range: {value}")))
}
