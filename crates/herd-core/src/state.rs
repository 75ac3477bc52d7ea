//! Closed state enumerations for work items and agents.
//!
//! Both enums carry a stable integer code used by storage adapters and a
//! lowercase string form used in serialized views. Conversions from raw
//! codes or strings are the only way an invalid state can reach the core,
//! and they fail with [`Error::InvalidState`].

use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a job or task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    Paused,
    Blocked,
    Queued,
    Running,
    Done,
    Failed,
}

impl WorkState {
    pub const ALL: [WorkState; 6] = [
        WorkState::Paused,
        WorkState::Blocked,
        WorkState::Queued,
        WorkState::Running,
        WorkState::Done,
        WorkState::Failed,
    ];

    pub fn code(&self) -> i32 {
        match self {
            WorkState::Paused => 100,
            WorkState::Blocked => 101,
            WorkState::Queued => 102,
            WorkState::Running => 103,
            WorkState::Done => 104,
            WorkState::Failed => 105,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| Error::InvalidState {
                field: "state",
                value: code.to_string(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkState::Paused => "paused",
            WorkState::Blocked => "blocked",
            WorkState::Queued => "queued",
            WorkState::Running => "running",
            WorkState::Done => "done",
            WorkState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkState::Done | WorkState::Failed)
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidState {
                field: "state",
                value: format!("{s:?}"),
            })
    }
}

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Offline,
    Online,
    Disabled,
    Running,
}

impl AgentState {
    pub const ALL: [AgentState; 4] = [
        AgentState::Offline,
        AgentState::Online,
        AgentState::Disabled,
        AgentState::Running,
    ];

    pub fn code(&self) -> i32 {
        match self {
            AgentState::Offline => 200,
            AgentState::Online => 201,
            AgentState::Disabled => 202,
            AgentState::Running => 203,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| Error::InvalidState {
                field: "state",
                value: code.to_string(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Offline => "offline",
            AgentState::Online => "online",
            AgentState::Disabled => "disabled",
            AgentState::Running => "running",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AgentState::Online)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidState {
                field: "state",
                value: format!("{s:?}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_state_codes_round_trip() {
        for state in WorkState::ALL {
            assert_eq!(WorkState::from_code(state.code()).unwrap(), state);
            assert_eq!(state.as_str().parse::<WorkState>().unwrap(), state);
        }
    }

    #[test]
    fn test_work_state_rejects_unknown() {
        assert!(matches!(
            WorkState::from_code(99),
            Err(Error::InvalidState { field: "state", .. })
        ));
        assert!("exploded".parse::<WorkState>().is_err());
        assert!(AgentState::from_code(103).is_err());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("RUNNING".parse::<WorkState>().unwrap(), WorkState::Running);
        assert_eq!("Online".parse::<AgentState>().unwrap(), AgentState::Online);
    }

    #[test]
    fn test_terminal_states() {
        assert!(WorkState::Done.is_terminal());
        assert!(WorkState::Failed.is_terminal());
        assert!(!WorkState::Running.is_terminal());
        assert!(!WorkState::Queued.is_terminal());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let json = serde_json::to_string(&WorkState::Queued).unwrap();
        assert_eq!(json, "\"queued\"");
        let json = serde_json::to_string(&AgentState::Disabled).unwrap();
        assert_eq!(json, "\"disabled\"");
    }
}
