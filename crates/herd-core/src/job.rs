//! Jobs: top-level units of schedulable work.

use crate::capability::{CapabilitySet, Software, Tag};
use crate::ids::{JobId, JobTypeId, TagId};
use crate::lifecycle::{StoredLifecycle, WorkItem, WorkLifecycle};
use crate::priority::PriorityPolicy;
use crate::record::{Column, ColumnType, Record, id_value, to_value};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use std::fmt;

/// Decoding goes through [`Job::from_stored`] with the default priority
/// bounds.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Job {
    id: JobId,
    title: String,
    jobtype_id: Option<JobTypeId>,
    #[serde(flatten)]
    lifecycle: WorkLifecycle,
    time_submitted: DateTime<Utc>,
    notes: String,
    /// Tags and software an agent must provide to run this job.
    #[serde(default)]
    requirements: CapabilitySet,
}

/// Job columns as persisted, not yet validated.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredJob {
    pub id: JobId,
    pub title: String,
    #[serde(default)]
    pub jobtype_id: Option<JobTypeId>,
    #[serde(flatten)]
    pub lifecycle: StoredLifecycle,
    pub time_submitted: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub requirements: CapabilitySet,
}

impl<'de> Deserialize<'de> for Job {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = StoredJob::deserialize(deserializer)?;
        Self::from_stored(&PriorityPolicy::default(), stored).map_err(de::Error::custom)
    }
}

impl Job {
    /// Rebuild a job read back from storage, re-running the checks its
    /// setters apply.
    pub fn from_stored(policy: &PriorityPolicy, stored: StoredJob) -> Result<Self> {
        Ok(Self {
            id: stored.id,
            title: validate_title(&stored.title)?,
            jobtype_id: stored.jobtype_id,
            lifecycle: WorkLifecycle::from_stored(policy, stored.lifecycle)?,
            time_submitted: stored.time_submitted,
            notes: stored.notes,
            requirements: stored.requirements,
        })
    }

    pub fn new(policy: &PriorityPolicy, title: &str, priority: i32) -> Result<Self> {
        Ok(Self {
            id: JobId::new(),
            title: validate_title(title)?,
            jobtype_id: None,
            lifecycle: WorkLifecycle::new(policy, priority)?,
            time_submitted: Utc::now(),
            notes: String::new(),
            requirements: CapabilitySet::new(),
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn jobtype_id(&self) -> Option<JobTypeId> {
        self.jobtype_id
    }

    pub fn time_submitted(&self) -> DateTime<Utc> {
        self.time_submitted
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn requirements(&self) -> &CapabilitySet {
        &self.requirements
    }

    pub fn set_title(&mut self, value: &str) -> Result<()> {
        self.title = validate_title(value)?;
        Ok(())
    }

    pub fn set_jobtype(&mut self, id: Option<JobTypeId>) {
        self.jobtype_id = id;
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    pub fn require_tag(&mut self, tag: Tag) -> bool {
        self.requirements.attach_tag(tag)
    }

    pub fn require_software(&mut self, software: Software) -> Result<()> {
        self.requirements.attach_software(software)
    }

    pub fn drop_tag(&mut self, id: TagId) -> Option<Tag> {
        self.requirements.detach_tag(id)
    }

    pub fn drop_software(&mut self, software: &str, version: &str) -> Option<Software> {
        self.requirements.detach_software(software, version)
    }
}

fn validate_title(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation {
            field: "title",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

impl WorkItem for Job {
    const KIND: &'static str = "job";

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

impl Record for Job {
    const NAME: &'static str = "Job";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnType::Id),
        Column::new("title", ColumnType::String(255)),
        Column::new("jobtype_id", ColumnType::Id),
        Column::new("priority", ColumnType::Integer),
        Column::new("state", ColumnType::Enum("WorkStateEnum")),
        Column::new("attempts", ColumnType::Integer),
        Column::new("time_submitted", ColumnType::DateTime),
        Column::new("time_started", ColumnType::DateTime),
        Column::new("time_finished", ColumnType::DateTime),
        Column::new("notes", ColumnType::Text),
    ];
    const REPR_COLUMNS: &'static [&'static str] = &["id", "title", "state", "priority"];

    fn column(&self, name: &str) -> Value {
        match name {
            "id" => id_value(&self.id),
            "title" => to_value(&self.title),
            "jobtype_id" => self.jobtype_id.map_or(Value::Null, |id| id_value(&id)),
            "priority" => to_value(&self.priority()),
            "state" => to_value(&self.state()),
            "attempts" => to_value(&self.attempts()),
            "time_submitted" => to_value(&self.time_submitted),
            "time_started" => to_value(&self.time_started()),
            "time_finished" => to_value(&self.time_finished()),
            "notes" => to_value(&self.notes),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkState;
    use chrono::Duration;

    fn job() -> Job {
        Job::new(&PriorityPolicy::default(), "shot_010 lighting", 500).unwrap()
    }

    #[test]
    fn test_new_job() {
        let job = job();
        assert_eq!(job.title(), "shot_010 lighting");
        assert_eq!(job.priority(), 500);
        assert_eq!(job.state(), WorkState::Queued);
        assert_eq!(job.attempts(), None);
        assert!(job.requirements().is_empty());
    }

    #[test]
    fn test_new_job_validation() {
        let policy = PriorityPolicy::default();
        assert!(Job::new(&policy, "  ", 0).is_err());
        assert!(Job::new(&policy, "ok", 1001).is_err());
        assert!(Job::new(&policy, "ok", -1001).is_err());
    }

    #[test]
    fn test_queued_running_done() {
        let mut job = job();
        let t0 = Utc::now();
        job.set_state_at(WorkState::Running, t0).unwrap();
        let change = job.set_state_at(WorkState::Done, t0 + Duration::milliseconds(250)).unwrap();

        assert!(!change.inconsistent_history);
        assert_eq!(job.state(), WorkState::Done);
        assert_eq!(job.attempts(), Some(1));
        assert!(job.time_started().unwrap() <= job.time_finished().unwrap());
    }

    #[test]
    fn test_invalid_state_code_keeps_state() {
        let mut job = job();
        job.set_state(WorkState::Running).unwrap();

        let err = job.set_state_code(7).unwrap_err();
        assert!(matches!(err, Error::InvalidState { field: "state", .. }));
        assert!(job.set_state_str("exploded").is_err());
        assert_eq!(job.state(), WorkState::Running);
        assert_eq!(job.attempts(), Some(1));
    }

    #[test]
    fn test_state_from_code_and_string() {
        let mut job = job();
        let change = job.set_state_code(WorkState::Running.code()).unwrap();
        assert!(change.changed);
        job.set_state_str("failed").unwrap();
        assert_eq!(job.state(), WorkState::Failed);
        assert!(job.time_finished().is_some());
    }

    #[test]
    fn test_to_dict_renders_enums_as_strings() {
        let mut job = job();
        job.set_state(WorkState::Running).unwrap();
        let dict = job.to_dict();

        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        let columns: Vec<&str> = Job::COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(keys, columns);
        assert_eq!(dict["state"], "running");
        assert_eq!(dict["priority"], 500);
        assert_eq!(dict["attempts"], 1);
        assert_eq!(dict["jobtype_id"], Value::Null);
        assert_eq!(dict["time_finished"], Value::Null);
        assert!(dict["time_started"].is_string());
    }

    #[test]
    fn test_requirements() {
        let mut job = job();
        let tag = Tag::new("gpu");
        assert!(job.require_tag(tag.clone()));
        assert!(!job.require_tag(tag.clone()));
        job.require_software(Software::new("houdini", "20.5")).unwrap();
        assert!(job.require_software(Software::new("houdini", "20.5")).is_err());
        assert_eq!(job.drop_tag(tag.id), Some(tag));
        assert!(job.drop_software("houdini", "20.5").is_some());
        assert!(job.requirements().is_empty());
    }

    #[test]
    fn test_serde_flattens_lifecycle() {
        let job = job();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["state"], "queued");
        assert_eq!(json["priority"], 500);
        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_display() {
        let job = job();
        assert!(job.to_string().ends_with(r#"title="shot_010 lighting", state="queued", priority=500)"#));
    }

    #[test]
    fn test_decode_round_trip() {
        let mut job = job();
        job.set_state(WorkState::Running).unwrap();
        job.require_tag(Tag::new("gpu"));

        let value = serde_json::to_value(&job).unwrap();
        let decoded: Job = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn test_decode_rejects_out_of_domain_fields() {
        let valid = serde_json::to_value(job()).unwrap();
        for (field, bad) in [
            ("priority", serde_json::json!(99_999)),
            ("attempts", serde_json::json!(0)),
            ("title", serde_json::json!("   ")),
            ("state", serde_json::json!("exploded")),
        ] {
            let mut value = valid.clone();
            value[field] = bad;
            assert!(
                serde_json::from_value::<Job>(value).is_err(),
                "{field} accepted"
            );
        }
    }

    #[test]
    fn test_from_stored_uses_given_bounds() {
        let mut value = serde_json::to_value(job()).unwrap();
        value["priority"] = serde_json::json!(5_000);
        let stored: StoredJob = serde_json::from_value(value).unwrap();

        let wide = PriorityPolicy::new(-10_000, 10_000).unwrap();
        let job = Job::from_stored(&wide, stored.clone()).unwrap();
        assert_eq!(job.priority(), 5_000);
        assert!(Job::from_stored(&PriorityPolicy::default(), stored).is_err());
    }
}
