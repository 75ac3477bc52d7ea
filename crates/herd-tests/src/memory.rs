//! In-memory implementation of the herd-core persistence ports.
//!
//! Behaves like a relational store with the constraints listed in
//! `herd_core::ports`: unique agent endpoints, one software row per
//! release per agent, non-empty tag labels, and cascade deletion of
//! association rows (never of the shared rows themselves).

use async_trait::async_trait;
use herd_core::agent::Agent;
use herd_core::capability::{Software, Tag};
use herd_core::ids::{AgentId, JobId, SoftwareId, TagId, TaskId};
use herd_core::job::Job;
use herd_core::ports::{AgentRepository, CapabilityRepository, JobRepository, TaskRepository};
use herd_core::task::Task;
use herd_core::{Error, Result, WorkItem, WorkState};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    agents: HashMap<AgentId, Agent>,
    tags: HashMap<TagId, Tag>,
    software: HashMap<SoftwareId, Software>,
    agent_tags: Vec<(AgentId, TagId)>,
    agent_software: Vec<(AgentId, SoftwareId)>,
    jobs: HashMap<JobId, Job>,
    tasks: HashMap<TaskId, Task>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::Database("store lock poisoned".to_string()))
    }

    /// Number of agent association rows (tags plus software).
    pub fn association_count(&self) -> Result<usize> {
        let tables = self.tables()?;
        Ok(tables.agent_tags.len() + tables.agent_software.len())
    }
}

impl Tables {
    fn check_agent(&self, agent: &Agent) -> Result<()> {
        let clash = self.agents.values().any(|other| {
            other.id() != agent.id()
                && other.hostname() == agent.hostname()
                && other.ip() == agent.ip()
                && other.port() == agent.port()
        });
        if clash {
            return Err(Error::Integrity(
                "UNIQUE constraint failed: agents.hostname, agents.ip, agents.port".to_string(),
            ));
        }

        if agent.tags().iter().any(|t| t.tag.trim().is_empty()) {
            return Err(Error::Integrity(
                "NOT NULL constraint failed: tags.tag".to_string(),
            ));
        }

        let mut releases = HashSet::new();
        for software in agent.software() {
            if !releases.insert((software.software.as_str(), software.version.as_str())) {
                return Err(Error::Integrity(
                    "UNIQUE constraint failed: agent_software.software, agent_software.version"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    fn drop_associations(&mut self, id: AgentId) {
        self.agent_tags.retain(|(owner, _)| *owner != id);
        self.agent_software.retain(|(owner, _)| *owner != id);
    }

    fn write_agent(&mut self, agent: &Agent) {
        let id = agent.id();
        self.drop_associations(id);
        for tag in agent.tags() {
            self.tags.entry(tag.id).or_insert_with(|| tag.clone());
            self.agent_tags.push((id, tag.id));
        }
        for software in agent.software() {
            self.software
                .entry(software.id)
                .or_insert_with(|| software.clone());
            self.agent_software.push((id, software.id));
        }
        self.agents.insert(id, agent.clone());
    }
}

#[async_trait]
impl AgentRepository for MemoryStore {
    async fn insert(&self, agent: &Agent) -> Result<AgentId> {
        let mut tables = self.tables()?;
        if tables.agents.contains_key(&agent.id()) {
            return Err(Error::Integrity(
                "UNIQUE constraint failed: agents.id".to_string(),
            ));
        }
        tables.check_agent(agent)?;
        tables.write_agent(agent);
        Ok(agent.id())
    }

    async fn get(&self, id: AgentId) -> Result<Option<Agent>> {
        Ok(self.tables()?.agents.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Agent>> {
        let mut agents: Vec<Agent> = self.tables()?.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.hostname().cmp(b.hostname()));
        Ok(agents)
    }

    async fn update(&self, agent: &Agent) -> Result<()> {
        let mut tables = self.tables()?;
        if !tables.agents.contains_key(&agent.id()) {
            return Err(Error::NotFound {
                entity: "agent",
                id: agent.id().to_string(),
            });
        }
        tables.check_agent(agent)?;
        tables.write_agent(agent);
        Ok(())
    }

    async fn remove(&self, id: AgentId) -> Result<()> {
        let mut tables = self.tables()?;
        if tables.agents.remove(&id).is_none() {
            return Err(Error::NotFound {
                entity: "agent",
                id: id.to_string(),
            });
        }
        tables.drop_associations(id);
        Ok(())
    }
}

#[async_trait]
impl CapabilityRepository for MemoryStore {
    async fn get_tag(&self, id: TagId) -> Result<Option<Tag>> {
        Ok(self.tables()?.tags.get(&id).cloned())
    }

    async fn get_software(&self, id: SoftwareId) -> Result<Option<Software>> {
        Ok(self.tables()?.software.get(&id).cloned())
    }

    async fn tag_owners(&self, id: TagId) -> Result<Vec<AgentId>> {
        Ok(self
            .tables()?
            .agent_tags
            .iter()
            .filter(|(_, tag)| *tag == id)
            .map(|(owner, _)| *owner)
            .collect())
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn insert(&self, job: &Job) -> Result<JobId> {
        let mut tables = self.tables()?;
        if tables.jobs.contains_key(&job.id()) {
            return Err(Error::Integrity("UNIQUE constraint failed: jobs.id".to_string()));
        }
        tables.jobs.insert(job.id(), job.clone());
        Ok(job.id())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.tables()?.jobs.get(&id).cloned())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let mut tables = self.tables()?;
        match tables.jobs.get_mut(&job.id()) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(Error::NotFound {
                entity: "job",
                id: job.id().to_string(),
            }),
        }
    }

    async fn list_by_state(&self, state: WorkState) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .tables()?
            .jobs
            .values()
            .filter(|j| j.state() == state)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then(a.time_submitted().cmp(&b.time_submitted()))
        });
        Ok(jobs)
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn insert(&self, task: &Task) -> Result<TaskId> {
        let mut tables = self.tables()?;
        if !tables.jobs.contains_key(&task.job_id()) {
            return Err(Error::Integrity(
                "FOREIGN KEY constraint failed: tasks.job_id".to_string(),
            ));
        }
        if tables.tasks.contains_key(&task.id()) {
            return Err(Error::Integrity("UNIQUE constraint failed: tasks.id".to_string()));
        }
        tables.tasks.insert(task.id(), task.clone());
        Ok(task.id())
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.tables()?.tasks.get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> Result<()> {
        let mut tables = self.tables()?;
        match tables.tasks.get_mut(&task.id()) {
            Some(stored) => {
                *stored = task.clone();
                Ok(())
            }
            None => Err(Error::NotFound {
                entity: "task",
                id: task.id().to_string(),
            }),
        }
    }

    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tables()?
            .tasks
            .values()
            .filter(|t| t.job_id() == job_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.frame().total_cmp(&b.frame()));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{AgentFixture, JobFixture};
    use herd_core::priority::PriorityPolicy;
    use serde_json::json;

    #[tokio::test]
    async fn test_agent_crud() {
        let store = MemoryStore::new();
        let agent = AgentFixture::default().one();

        let id = AgentRepository::insert(&store, &agent).await.unwrap();
        let found = AgentRepository::get(&store, id).await.unwrap().unwrap();
        assert_eq!(found, agent);

        store.remove(id).await.unwrap();
        assert!(AgentRepository::get(&store, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_agent() {
        let store = MemoryStore::new();
        let err = store.remove(AgentId::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "agent", .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_own_endpoint() {
        let store = MemoryStore::new();
        let mut agent = AgentFixture::default().one();
        AgentRepository::insert(&store, &agent).await.unwrap();

        agent.set_time_offset(5);
        AgentRepository::update(&store, &agent).await.unwrap();
        let found = AgentRepository::get(&store, agent.id()).await.unwrap().unwrap();
        assert_eq!(found.time_offset(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_release_rejected_by_storage() {
        let store = MemoryStore::new();
        let mut value = serde_json::to_value(AgentFixture::default().one()).unwrap();
        value["capabilities"]["software"] = json!([
            serde_json::to_value(Software::new("blender", "4.1")).unwrap(),
            serde_json::to_value(Software::new("blender", "4.1")).unwrap(),
        ]);
        let agent: Agent = serde_json::from_value(value).unwrap();

        let err = AgentRepository::insert(&store, &agent).await.unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
        assert!(AgentRepository::list(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rewrites_associations() {
        let store = MemoryStore::new();
        let mut agent = AgentFixture::default().one();
        let tag = Tag::new("gpu");
        agent.attach_tag(tag.clone());
        AgentRepository::insert(&store, &agent).await.unwrap();
        assert_eq!(store.association_count().unwrap(), 1);

        agent.detach_tag(tag.id);
        AgentRepository::update(&store, &agent).await.unwrap();
        assert_eq!(store.association_count().unwrap(), 0);
        assert!(store.tag_owners(tag.id).await.unwrap().is_empty());
        assert!(store.get_tag(tag.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_task_requires_job() {
        let store = MemoryStore::new();
        let policy = PriorityPolicy::default();
        let (job, tasks) = JobFixture::with_frames(&policy, 0, [1]);

        let err = TaskRepository::insert(&store, &tasks[0]).await.unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));

        JobRepository::insert(&store, &job).await.unwrap();
        TaskRepository::insert(&store, &tasks[0]).await.unwrap();
    }

    #[tokio::test]
    async fn test_tasks_listed_by_frame() {
        let store = MemoryStore::new();
        let policy = PriorityPolicy::default();
        let (job, tasks) = JobFixture::with_frames(&policy, 0, [3, 1, 2]);
        JobRepository::insert(&store, &job).await.unwrap();
        for task in &tasks {
            TaskRepository::insert(&store, task).await.unwrap();
        }

        let frames: Vec<f64> = store
            .list_for_job(job.id())
            .await
            .unwrap()
            .iter()
            .map(|t| t.frame())
            .collect();
        assert_eq!(frames, vec![1.0, 2.0, 3.0]);
    }
}
