//! Test fixtures for creating sample data.

use herd_core::agent::{Agent, AgentRegistration};
use herd_core::job::Job;
use herd_core::priority::PriorityPolicy;
use herd_core::task::Task;
use herd_core::validation::AgentLimits;
use herd_core::AgentState;

/// Private-range addresses covering the start and end of each block.
pub const PRIVATE_ADDRESSES: [&str; 6] = [
    "10.0.0.0",
    "172.16.0.0",
    "192.168.0.0",
    "10.255.255.255",
    "172.31.255.255",
    "192.168.255.255",
];

/// Factory for agents whose fields sit at the extremes of the limits.
pub struct AgentFixture {
    pub hostname_base: String,
    pub limits: AgentLimits,
}

impl AgentFixture {
    pub fn new(limits: AgentLimits) -> Self {
        Self {
            hostname_base: "foobar".to_string(),
            limits,
        }
    }

    /// Registrations over every combination of address, port, cpus and
    /// ram extreme, numbered `foobar00`, `foobar01`, ...
    pub fn registrations(&self, limit: Option<usize>) -> Vec<AgentRegistration> {
        let ports = [self.limits.port.min, self.limits.port.max];
        let cpus = [self.limits.cpus.min, self.limits.cpus.max];
        let ram = [self.limits.ram.min, self.limits.ram.max];

        let mut out = Vec::new();
        for ip in PRIVATE_ADDRESSES {
            for port in ports {
                for cpus in cpus {
                    for ram in ram {
                        if limit.is_some_and(|l| out.len() >= l) {
                            return out;
                        }
                        out.push(AgentRegistration {
                            hostname: format!("{}{:02}", self.hostname_base, out.len()),
                            ip: ip.to_string(),
                            remote_ip: Some(ip.to_string()),
                            port,
                            cpus,
                            ram,
                        });
                    }
                }
            }
        }
        out
    }

    /// Validated agents, alternating online/offline and cycling the
    /// allocation fractions through 0, 0.5 and 1.
    pub fn agents(&self, limit: Option<usize>) -> anyhow::Result<Vec<Agent>> {
        const FRACTIONS: [f64; 3] = [0.0, 0.5, 1.0];

        self.registrations(limit)
            .into_iter()
            .enumerate()
            .map(|(i, registration)| -> anyhow::Result<Agent> {
                let mut agent = Agent::new(&self.limits, registration)?;
                agent.set_state(if i % 2 == 0 {
                    AgentState::Online
                } else {
                    AgentState::Offline
                });
                agent.set_ram_allocation(FRACTIONS[i % 3])?;
                agent.set_cpu_allocation(FRACTIONS[(i + 1) % 3])?;
                Ok(agent)
            })
            .collect()
    }

    /// The first generated agent.
    pub fn one(&self) -> Agent {
        self.agents(Some(1))
            .expect("fixture agent is valid")
            .remove(0)
    }
}

impl Default for AgentFixture {
    fn default() -> Self {
        Self::new(AgentLimits::default())
    }
}

/// Factory for jobs and their tasks.
pub struct JobFixture;

impl JobFixture {
    pub fn job(policy: &PriorityPolicy, priority: i32) -> Job {
        Job::new(policy, "test-job", priority).expect("fixture job is valid")
    }

    /// A job with one task per frame in `frames`.
    pub fn with_frames(
        policy: &PriorityPolicy,
        priority: i32,
        frames: impl IntoIterator<Item = u32>,
    ) -> (Job, Vec<Task>) {
        let job = Self::job(policy, priority);
        let tasks = frames
            .into_iter()
            .map(|frame| Task::for_job(policy, &job, f64::from(frame)).expect("fixture task is valid"))
            .collect();
        (job, tasks)
    }
}
