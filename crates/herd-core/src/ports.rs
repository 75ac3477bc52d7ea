//! Port traits (hexagonal architecture).
//!
//! Persistence is an external adapter. Adapters enforce storage-level
//! constraints as a backstop and report violations as
//! [`Error::Integrity`](crate::Error::Integrity), which callers receive
//! unchanged:
//!
//! - an agent's `(hostname, ip, port)` is unique;
//! - an agent holds at most one software row per `(software, version)`;
//! - a tag label is never empty.
//!
//! Removing an agent deletes its association rows but never the shared tag
//! or software rows they point to.

use crate::agent::Agent;
use crate::capability::{Software, Tag};
use crate::ids::*;
use crate::job::Job;
use crate::state::WorkState;
use crate::task::Task;
use crate::Result;
use async_trait::async_trait;

/// Repository for agents and their capability associations.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Insert a new agent together with its tags and software.
    async fn insert(&self, agent: &Agent) -> Result<AgentId>;

    /// Get an agent by ID.
    async fn get(&self, id: AgentId) -> Result<Option<Agent>>;

    /// List all agents.
    async fn list(&self) -> Result<Vec<Agent>>;

    /// Replace a stored agent and its associations.
    async fn update(&self, agent: &Agent) -> Result<()>;

    /// Remove an agent and its association rows.
    async fn remove(&self, id: AgentId) -> Result<()>;
}

/// Read access to the shared tag and software rows.
#[async_trait]
pub trait CapabilityRepository: Send + Sync {
    async fn get_tag(&self, id: TagId) -> Result<Option<Tag>>;

    async fn get_software(&self, id: SoftwareId) -> Result<Option<Software>>;

    /// Agents currently associated with a tag.
    async fn tag_owners(&self, id: TagId) -> Result<Vec<AgentId>>;
}

/// Repository for jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: &Job) -> Result<JobId>;

    async fn get(&self, id: JobId) -> Result<Option<Job>>;

    async fn update(&self, job: &Job) -> Result<()>;

    /// Jobs in `state`, highest priority first.
    async fn list_by_state(&self, state: WorkState) -> Result<Vec<Job>>;
}

/// Repository for tasks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert(&self, task: &Task) -> Result<TaskId>;

    async fn get(&self, id: TaskId) -> Result<Option<Task>>;

    async fn update(&self, task: &Task) -> Result<()>;

    /// Tasks of one job, ordered by frame.
    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<Task>>;
}
