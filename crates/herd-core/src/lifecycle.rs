//! Work-item lifecycle: state transitions and their temporal bookkeeping.
//!
//! Jobs and tasks embed a [`WorkLifecycle`] and expose it through the
//! [`WorkItem`] trait, so both share one transition handler. Side effects
//! fire once per observed change of state:
//!
//! - entering `Running` stamps `time_started`, clears `time_finished` and
//!   counts an attempt;
//! - entering `Done` or `Failed` stamps `time_finished`, warning when the
//!   item was never started;
//! - anything else only changes the state.

use crate::priority::PriorityPolicy;
use crate::state::WorkState;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, de};
use tracing::{debug, warn};

/// Scheduling fields shared by every work item.
///
/// Decoding goes through [`WorkLifecycle::from_stored`] with the default
/// priority bounds.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct WorkLifecycle {
    priority: i32,
    state: WorkState,
    attempts: Option<i32>,
    time_started: Option<DateTime<Utc>>,
    time_finished: Option<DateTime<Utc>>,
}

impl WorkLifecycle {
    /// A queued, never-attempted lifecycle.
    pub fn new(policy: &PriorityPolicy, priority: i32) -> Result<Self> {
        Ok(Self {
            priority: policy.validate_priority(priority)?,
            state: WorkState::Queued,
            attempts: None,
            time_started: None,
            time_finished: None,
        })
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn state(&self) -> WorkState {
        self.state
    }

    pub fn attempts(&self) -> Option<i32> {
        self.attempts
    }

    pub fn time_started(&self) -> Option<DateTime<Utc>> {
        self.time_started
    }

    pub fn time_finished(&self) -> Option<DateTime<Utc>> {
        self.time_finished
    }

    pub fn set_priority(&mut self, policy: &PriorityPolicy, value: i32) -> Result<()> {
        self.priority = policy.validate_priority(value)?;
        Ok(())
    }

    pub fn set_attempts(&mut self, policy: &PriorityPolicy, value: Option<i32>) -> Result<()> {
        self.attempts = policy.validate_attempts(value)?;
        Ok(())
    }

    /// Rebuild a lifecycle read back from storage, re-running the checks
    /// its setters apply.
    pub fn from_stored(policy: &PriorityPolicy, stored: StoredLifecycle) -> Result<Self> {
        if let (Some(started), Some(finished)) = (stored.time_started, stored.time_finished) {
            if finished < started {
                return Err(Error::validation(
                    "time_finished",
                    format!("{finished} is before time_started {started}"),
                ));
            }
        }
        Ok(Self {
            priority: policy.validate_priority(stored.priority)?,
            state: stored.state,
            attempts: policy.validate_attempts(stored.attempts)?,
            time_started: stored.time_started,
            time_finished: stored.time_finished,
        })
    }
}

/// Lifecycle fields as persisted, not yet validated.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredLifecycle {
    pub priority: i32,
    pub state: WorkState,
    #[serde(default)]
    pub attempts: Option<i32>,
    #[serde(default)]
    pub time_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_finished: Option<DateTime<Utc>>,
}

impl<'de> Deserialize<'de> for WorkLifecycle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = StoredLifecycle::deserialize(deserializer)?;
        Self::from_stored(&PriorityPolicy::default(), stored).map_err(de::Error::custom)
    }
}

/// What a call to [`WorkStateMachine::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: WorkState,
    pub to: WorkState,
    pub at: DateTime<Utc>,
    /// False when the item already held `to`; no side effects ran.
    pub changed: bool,
    /// The item finished without ever having been started.
    pub inconsistent_history: bool,
}

/// Transition handler for work-item state.
pub struct WorkStateMachine;

impl WorkStateMachine {
    /// Move `lifecycle` into `new`, applying side effects stamped at `now`.
    ///
    /// A finish is never stamped before the recorded start. Fails, leaving
    /// `lifecycle` untouched, when entering `Running` would overflow the
    /// attempt counter.
    pub fn apply(
        lifecycle: &mut WorkLifecycle,
        new: WorkState,
        now: DateTime<Utc>,
        kind: &str,
        id: &str,
    ) -> Result<StateChange> {
        let old = lifecycle.state;
        let mut change = StateChange {
            from: old,
            to: new,
            at: now,
            changed: old != new,
            inconsistent_history: false,
        };
        if !change.changed {
            return Ok(change);
        }

        match new {
            WorkState::Running => {
                let attempts = match lifecycle.attempts {
                    None => 1,
                    Some(n) => n.checked_add(1).ok_or_else(|| {
                        Error::validation(
                            "attempts",
                            format!("{kind} {id} cannot be started again after {n} attempts"),
                        )
                    })?,
                };
                lifecycle.state = new;
                lifecycle.time_started = Some(now);
                lifecycle.time_finished = None;
                lifecycle.attempts = Some(attempts);
                debug!(kind, id, attempts, "Work item started");
            }
            WorkState::Done | WorkState::Failed => {
                let finished = match lifecycle.time_started {
                    None => {
                        change.inconsistent_history = true;
                        warn!(
                            kind,
                            id,
                            state = %new,
                            "{kind} {id} has not been started yet, state is being set to {new}"
                        );
                        now
                    }
                    Some(started) if now < started => {
                        warn!(
                            kind,
                            id,
                            started = %started,
                            finished = %now,
                            "Finish time precedes start time, stamping the start time instead"
                        );
                        started
                    }
                    Some(_) => now,
                };
                lifecycle.state = new;
                lifecycle.time_finished = Some(finished);
                change.at = finished;
                debug!(kind, id, state = %new, "Work item finished");
            }
            _ => {
                lifecycle.state = new;
                debug!(kind, id, from = %old, to = %new, "Work item state changed");
            }
        }
        Ok(change)
    }
}

/// Behaviour shared by jobs and tasks.
pub trait WorkItem {
    /// Short name used in log events, e.g. `"job"`.
    const KIND: &'static str;

    fn item_id(&self) -> String;

    fn lifecycle(&self) -> &WorkLifecycle;

    fn lifecycle_mut(&mut self) -> &mut WorkLifecycle;

    fn state(&self) -> WorkState {
        self.lifecycle().state()
    }

    fn priority(&self) -> i32 {
        self.lifecycle().priority()
    }

    fn attempts(&self) -> Option<i32> {
        self.lifecycle().attempts()
    }

    fn time_started(&self) -> Option<DateTime<Utc>> {
        self.lifecycle().time_started()
    }

    fn time_finished(&self) -> Option<DateTime<Utc>> {
        self.lifecycle().time_finished()
    }

    fn set_priority(&mut self, policy: &PriorityPolicy, value: i32) -> Result<()> {
        self.lifecycle_mut().set_priority(policy, value)
    }

    fn set_attempts(&mut self, policy: &PriorityPolicy, value: Option<i32>) -> Result<()> {
        self.lifecycle_mut().set_attempts(policy, value)
    }

    fn set_state(&mut self, new: WorkState) -> Result<StateChange> {
        self.set_state_at(new, Utc::now())
    }

    fn set_state_at(&mut self, new: WorkState, now: DateTime<Utc>) -> Result<StateChange> {
        let id = self.item_id();
        WorkStateMachine::apply(self.lifecycle_mut(), new, now, Self::KIND, &id)
    }

    /// Assign a state from its storage code.
    fn set_state_code(&mut self, code: i32) -> Result<StateChange> {
        let new = WorkState::from_code(code)?;
        self.set_state(new)
    }

    /// Assign a state from its string form.
    fn set_state_str(&mut self, value: &str) -> Result<StateChange> {
        let new: WorkState = value.parse()?;
        self.set_state(new)
    }
}
