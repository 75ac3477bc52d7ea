//! Tasks: individual frames of a job, each dispatched to one agent.

use crate::ids::{AgentId, JobId, TaskId};
use crate::job::Job;
use crate::lifecycle::{StoredLifecycle, WorkItem, WorkLifecycle};
use crate::priority::PriorityPolicy;
use crate::record::{Column, ColumnType, Record, id_value, to_value};
use crate::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use std::fmt;

/// Decoding goes through [`Task::from_stored`] with the default priority
/// bounds.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Task {
    id: TaskId,
    job_id: JobId,
    agent_id: Option<AgentId>,
    frame: f64,
    #[serde(flatten)]
    lifecycle: WorkLifecycle,
}

/// Task columns as persisted, not yet validated.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredTask {
    pub id: TaskId,
    pub job_id: JobId,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    pub frame: f64,
    #[serde(flatten)]
    pub lifecycle: StoredLifecycle,
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = StoredTask::deserialize(deserializer)?;
        Self::from_stored(&PriorityPolicy::default(), stored).map_err(de::Error::custom)
    }
}

impl Task {
    pub fn from_stored(policy: &PriorityPolicy, stored: StoredTask) -> Result<Self> {
        Ok(Self {
            id: stored.id,
            job_id: stored.job_id,
            agent_id: stored.agent_id,
            frame: stored.frame,
            lifecycle: WorkLifecycle::from_stored(policy, stored.lifecycle)?,
        })
    }

    pub fn new(policy: &PriorityPolicy, job_id: JobId, frame: f64, priority: i32) -> Result<Self> {
        Ok(Self {
            id: TaskId::new(),
            job_id,
            agent_id: None,
            frame,
            lifecycle: WorkLifecycle::new(policy, priority)?,
        })
    }

    /// A task for `frame` that inherits the job's priority.
    pub fn for_job(policy: &PriorityPolicy, job: &Job, frame: f64) -> Result<Self> {
        Self::new(policy, job.id(), frame, job.priority())
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        self.agent_id
    }

    pub fn frame(&self) -> f64 {
        self.frame
    }

    pub fn assign(&mut self, agent_id: AgentId) {
        self.agent_id = Some(agent_id);
    }

    pub fn unassign(&mut self) -> Option<AgentId> {
        self.agent_id.take()
    }
}

impl WorkItem for Task {
    const KIND: &'static str = "task";

    fn item_id(&self) -> String {
        self.id.to_string()
    }

    fn lifecycle(&self) -> &WorkLifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut WorkLifecycle {
        &mut self.lifecycle
    }
}

impl Record for Task {
    const NAME: &'static str = "Task";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnType::Id),
        Column::new("job_id", ColumnType::Id),
        Column::new("agent_id", ColumnType::Id),
        Column::new("frame", ColumnType::Float),
        Column::new("priority", ColumnType::Integer),
        Column::new("state", ColumnType::Enum("WorkStateEnum")),
        Column::new("attempts", ColumnType::Integer),
        Column::new("time_started", ColumnType::DateTime),
        Column::new("time_finished", ColumnType::DateTime),
    ];
    const REPR_COLUMNS: &'static [&'static str] = &["id", "job_id", "frame", "state"];

    fn column(&self, name: &str) -> Value {
        match name {
            "id" => id_value(&self.id),
            "job_id" => id_value(&self.job_id),
            "agent_id" => self.agent_id.map_or(Value::Null, |id| id_value(&id)),
            "frame" => to_value(&self.frame),
            "priority" => to_value(&self.priority()),
            "state" => to_value(&self.state()),
            "attempts" => to_value(&self.attempts()),
            "time_started" => to_value(&self.time_started()),
            "time_finished" => to_value(&self.time_finished()),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkState;

    fn task() -> Task {
        let policy = PriorityPolicy::default();
        let job = Job::new(&policy, "comp", -20).unwrap();
        Task::for_job(&policy, &job, 1001.0).unwrap()
    }

    #[test]
    fn test_task_inherits_job_priority() {
        let task = task();
        assert_eq!(task.priority(), -20);
        assert_eq!(task.frame(), 1001.0);
        assert_eq!(task.state(), WorkState::Queued);
    }

    #[test]
    fn test_retries_count_attempts() {
        let mut task = task();
        task.set_state(WorkState::Running).unwrap();
        task.set_state(WorkState::Failed).unwrap();
        task.set_state(WorkState::Queued).unwrap();
        task.set_state(WorkState::Running).unwrap();
        assert_eq!(task.attempts(), Some(2));
        assert_eq!(task.time_finished(), None);
    }

    #[test]
    fn test_assignment() {
        let mut task = task();
        let agent = AgentId::new();
        task.assign(agent);
        assert_eq!(task.agent_id(), Some(agent));
        assert_eq!(task.to_dict()["agent_id"], agent.to_string());
        assert_eq!(task.unassign(), Some(agent));
        assert_eq!(task.agent_id(), None);
    }

    #[test]
    fn test_to_dict() {
        let task = task();
        let dict = task.to_dict();
        assert_eq!(dict.len(), Task::COLUMNS.len());
        assert_eq!(dict["frame"], 1001.0);
        assert_eq!(dict["state"], "queued");
        assert_eq!(dict["agent_id"], Value::Null);
        assert_eq!(Task::to_schema()["frame"], "FLOAT");
    }

    #[test]
    fn test_decode_validates_lifecycle() {
        let mut task = task();
        task.set_state(WorkState::Running).unwrap();
        let value = serde_json::to_value(&task).unwrap();
        let decoded: Task = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(decoded, task);

        let mut bad = value;
        bad["attempts"] = serde_json::json!(-1);
        assert!(serde_json::from_value::<Task>(bad).is_err());
    }
}
