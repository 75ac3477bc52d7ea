//! Agent (worker machine) entity.
//!
//! Every field is assigned through a validating setter; a rejected value
//! leaves the agent untouched.

use crate::capability::{CapabilitySet, Software, Tag};
use crate::ids::{AgentId, TagId};
use crate::record::{Column, ColumnType, Record, id_value, to_value};
use crate::state::AgentState;
use crate::validation::{
    AgentLimits, check_ip, validate_fraction, validate_hostname, validate_ip, validate_range,
};
use crate::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

const DEFAULT_RAM_ALLOCATION: f64 = 0.8;
const DEFAULT_CPU_ALLOCATION: f64 = 1.0;

/// Decoding goes through [`Agent::from_stored`] with the default limits.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Agent {
    id: AgentId,
    hostname: String,
    ip: Ipv4Addr,
    remote_ip: Option<Ipv4Addr>,
    port: i64,
    cpus: i64,
    /// Megabytes.
    ram: i64,
    free_ram: i64,
    /// Minutes the agent's clock is ahead of the master.
    time_offset: i32,
    state: AgentState,
    ram_allocation: f64,
    cpu_allocation: f64,
    #[serde(default)]
    capabilities: CapabilitySet,
}

/// Values an agent reports when it first registers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentRegistration {
    pub hostname: String,
    pub ip: String,
    #[serde(default)]
    pub remote_ip: Option<String>,
    pub port: i64,
    pub cpus: i64,
    pub ram: i64,
}

/// Agent columns as persisted, not yet validated.
///
/// Tag and software associations are taken as stored; their uniqueness is
/// enforced by the storage adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredAgent {
    pub id: AgentId,
    pub hostname: String,
    pub ip: Ipv4Addr,
    #[serde(default)]
    pub remote_ip: Option<Ipv4Addr>,
    pub port: i64,
    pub cpus: i64,
    pub ram: i64,
    pub free_ram: i64,
    #[serde(default)]
    pub time_offset: i32,
    pub state: AgentState,
    pub ram_allocation: f64,
    pub cpu_allocation: f64,
    #[serde(default)]
    pub capabilities: CapabilitySet,
}

impl<'de> Deserialize<'de> for Agent {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = StoredAgent::deserialize(deserializer)?;
        Self::from_stored(&AgentLimits::default(), stored).map_err(de::Error::custom)
    }
}

impl Agent {
    /// Rebuild an agent read back from storage, re-running every field
    /// validator against `limits`.
    pub fn from_stored(limits: &AgentLimits, stored: StoredAgent) -> Result<Self> {
        Ok(Self {
            id: stored.id,
            hostname: validate_hostname(&stored.hostname)?,
            ip: check_ip("ip", stored.ip)?,
            remote_ip: stored
                .remote_ip
                .map(|ip| check_ip("remote_ip", ip))
                .transpose()?,
            port: validate_range("port", stored.port, &limits.port)?,
            cpus: validate_range("cpus", stored.cpus, &limits.cpus)?,
            ram: validate_range("ram", stored.ram, &limits.ram)?,
            free_ram: validate_range("free_ram", stored.free_ram, &limits.ram)?,
            time_offset: stored.time_offset,
            state: stored.state,
            ram_allocation: validate_fraction("ram_allocation", stored.ram_allocation)?,
            cpu_allocation: validate_fraction("cpu_allocation", stored.cpu_allocation)?,
            capabilities: stored.capabilities,
        })
    }

    /// Build an offline agent from a registration, validating every field.
    pub fn new(limits: &AgentLimits, registration: AgentRegistration) -> Result<Self> {
        let remote_ip = registration
            .remote_ip
            .as_deref()
            .map(|ip| validate_ip("remote_ip", ip))
            .transpose()?;
        let ram = validate_range("ram", registration.ram, &limits.ram)?;

        Ok(Self {
            id: AgentId::new(),
            hostname: validate_hostname(&registration.hostname)?,
            ip: validate_ip("ip", &registration.ip)?,
            remote_ip,
            port: validate_range("port", registration.port, &limits.port)?,
            cpus: validate_range("cpus", registration.cpus, &limits.cpus)?,
            ram,
            free_ram: ram,
            time_offset: 0,
            state: AgentState::Offline,
            ram_allocation: DEFAULT_RAM_ALLOCATION,
            cpu_allocation: DEFAULT_CPU_ALLOCATION,
            capabilities: CapabilitySet::new(),
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn remote_ip(&self) -> Option<Ipv4Addr> {
        self.remote_ip
    }

    pub fn port(&self) -> i64 {
        self.port
    }

    pub fn cpus(&self) -> i64 {
        self.cpus
    }

    pub fn ram(&self) -> i64 {
        self.ram
    }

    pub fn free_ram(&self) -> i64 {
        self.free_ram
    }

    pub fn time_offset(&self) -> i32 {
        self.time_offset
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn ram_allocation(&self) -> f64 {
        self.ram_allocation
    }

    pub fn cpu_allocation(&self) -> f64 {
        self.cpu_allocation
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn tags(&self) -> &[Tag] {
        self.capabilities.tags()
    }

    pub fn software(&self) -> &[Software] {
        self.capabilities.software()
    }

    pub fn set_hostname(&mut self, value: &str) -> Result<()> {
        self.hostname = validate_hostname(value)?;
        Ok(())
    }

    pub fn set_ip(&mut self, value: &str) -> Result<()> {
        self.ip = validate_ip("ip", value)?;
        Ok(())
    }

    pub fn set_remote_ip(&mut self, value: Option<&str>) -> Result<()> {
        self.remote_ip = value.map(|ip| validate_ip("remote_ip", ip)).transpose()?;
        Ok(())
    }

    pub fn set_port(&mut self, limits: &AgentLimits, value: i64) -> Result<()> {
        self.port = validate_range("port", value, &limits.port)?;
        Ok(())
    }

    pub fn set_cpus(&mut self, limits: &AgentLimits, value: i64) -> Result<()> {
        self.cpus = validate_range("cpus", value, &limits.cpus)?;
        Ok(())
    }

    pub fn set_ram(&mut self, limits: &AgentLimits, value: i64) -> Result<()> {
        self.ram = validate_range("ram", value, &limits.ram)?;
        Ok(())
    }

    pub fn set_free_ram(&mut self, limits: &AgentLimits, value: i64) -> Result<()> {
        self.free_ram = validate_range("free_ram", value, &limits.ram)?;
        Ok(())
    }

    pub fn set_time_offset(&mut self, minutes: i32) {
        self.time_offset = minutes;
    }

    pub fn set_state(&mut self, state: AgentState) {
        if self.state != state {
            debug!(agent_id = %self.id, from = %self.state, to = %state, "Agent state changed");
        }
        self.state = state;
    }

    /// Assign a state from its storage code.
    pub fn set_state_code(&mut self, code: i32) -> Result<()> {
        self.set_state(AgentState::from_code(code)?);
        Ok(())
    }

    pub fn set_ram_allocation(&mut self, value: f64) -> Result<()> {
        self.ram_allocation = validate_fraction("ram_allocation", value)?;
        Ok(())
    }

    pub fn set_cpu_allocation(&mut self, value: f64) -> Result<()> {
        self.cpu_allocation = validate_fraction("cpu_allocation", value)?;
        Ok(())
    }

    /// See [`CapabilitySet::attach_tag`].
    pub fn attach_tag(&mut self, tag: Tag) -> bool {
        self.capabilities.attach_tag(tag)
    }

    /// See [`CapabilitySet::attach_software`].
    pub fn attach_software(&mut self, software: Software) -> Result<()> {
        self.capabilities.attach_software(software)
    }

    pub fn detach_tag(&mut self, id: TagId) -> Option<Tag> {
        self.capabilities.detach_tag(id)
    }

    pub fn detach_software(&mut self, software: &str, version: &str) -> Option<Software> {
        self.capabilities.detach_software(software, version)
    }

    /// Remove all tag and software associations.
    pub fn clear_capabilities(&mut self) -> (Vec<Tag>, Vec<Software>) {
        self.capabilities.clear()
    }
}

impl Record for Agent {
    const NAME: &'static str = "Agent";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnType::Id),
        Column::new("hostname", ColumnType::String(255)),
        Column::new("ip", ColumnType::Ipv4),
        Column::new("remote_ip", ColumnType::Ipv4),
        Column::new("port", ColumnType::Integer),
        Column::new("cpus", ColumnType::Integer),
        Column::new("ram", ColumnType::Integer),
        Column::new("free_ram", ColumnType::Integer),
        Column::new("time_offset", ColumnType::Integer),
        Column::new("state", ColumnType::Enum("AgentStateEnum")),
        Column::new("ram_allocation", ColumnType::Float),
        Column::new("cpu_allocation", ColumnType::Float),
    ];
    const REPR_COLUMNS: &'static [&'static str] = &["id", "hostname", "ip", "port", "state"];

    fn column(&self, name: &str) -> Value {
        match name {
            "id" => id_value(&self.id),
            "hostname" => to_value(&self.hostname),
            "ip" => to_value(&self.ip),
            "remote_ip" => to_value(&self.remote_ip),
            "port" => to_value(&self.port),
            "cpus" => to_value(&self.cpus),
            "ram" => to_value(&self.ram),
            "free_ram" => to_value(&self.free_ram),
            "time_offset" => to_value(&self.time_offset),
            "state" => to_value(&self.state),
            "ram_allocation" => to_value(&self.ram_allocation),
            "cpu_allocation" => to_value(&self.cpu_allocation),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn registration() -> AgentRegistration {
        AgentRegistration {
            hostname: "foobar00".to_string(),
            ip: "10.0.0.1".to_string(),
            remote_ip: None,
            port: 1024,
            cpus: 8,
            ram: 4096,
        }
    }

    fn agent() -> Agent {
        Agent::new(&AgentLimits::default(), registration()).unwrap()
    }

    #[test]
    fn test_new_agent_defaults() {
        let agent = agent();
        assert_eq!(agent.hostname(), "foobar00");
        assert_eq!(agent.ip(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(agent.remote_ip(), None);
        assert_eq!(agent.state(), AgentState::Offline);
        assert_eq!(agent.free_ram(), 4096);
        assert_eq!(agent.ram_allocation(), 0.8);
        assert_eq!(agent.cpu_allocation(), 1.0);
        assert!(agent.capabilities().is_empty());
    }

    #[test]
    fn test_new_rejects_bad_registration() {
        let limits = AgentLimits::default();

        let mut reg = registration();
        reg.hostname = "foo/bar".into();
        assert!(matches!(
            Agent::new(&limits, reg),
            Err(Error::Validation { field: "hostname", .. })
        ));

        let mut reg = registration();
        reg.remote_ip = Some("127.0.0.1".into());
        assert!(matches!(
            Agent::new(&limits, reg),
            Err(Error::Validation { field: "remote_ip", .. })
        ));

        let mut reg = registration();
        reg.port = 80;
        assert!(matches!(
            Agent::new(&limits, reg),
            Err(Error::Validation { field: "port", .. })
        ));
    }

    #[test]
    fn test_rejected_assignment_keeps_value() {
        let limits = AgentLimits::default();
        let mut agent = agent();

        assert!(agent.set_hostname("").is_err());
        assert!(agent.set_ip("169.254.0.0").is_err());
        assert!(agent.set_cpus(&limits, 0).is_err());
        assert!(agent.set_ram_allocation(2.0).is_err());
        assert!(agent.set_state_code(-1).is_err());

        assert_eq!(agent.hostname(), "foobar00");
        assert_eq!(agent.ip(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(agent.cpus(), 8);
        assert_eq!(agent.ram_allocation(), 0.8);
        assert_eq!(agent.state(), AgentState::Offline);
    }

    #[test]
    fn test_bounds_at_extremes() {
        let limits = AgentLimits::default();
        let mut agent = agent();

        agent.set_port(&limits, limits.port.min).unwrap();
        agent.set_port(&limits, limits.port.max).unwrap();
        assert!(agent.set_port(&limits, limits.port.min - 10).is_err());
        assert!(agent.set_port(&limits, limits.port.max + 10).is_err());

        agent.set_cpus(&limits, limits.cpus.min).unwrap();
        agent.set_cpus(&limits, limits.cpus.max).unwrap();
        assert!(agent.set_cpus(&limits, limits.cpus.min - 10).is_err());
        assert!(agent.set_cpus(&limits, limits.cpus.max + 10).is_err());

        agent.set_ram(&limits, limits.ram.min).unwrap();
        agent.set_ram(&limits, limits.ram.max).unwrap();
        assert!(agent.set_ram(&limits, limits.ram.min - 10).is_err());
        assert!(agent.set_ram(&limits, limits.ram.max + 10).is_err());
    }

    #[test]
    fn test_state_assignment() {
        let mut agent = agent();
        agent.set_state(AgentState::Online);
        assert!(agent.state().is_available());
        agent.set_state_code(AgentState::Disabled.code()).unwrap();
        assert_eq!(agent.state(), AgentState::Disabled);
    }

    #[test]
    fn test_to_dict_has_every_column_once() {
        let mut agent = agent();
        agent.set_remote_ip(Some("192.168.0.10")).unwrap();
        let dict = agent.to_dict();

        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        let columns: Vec<&str> = Agent::COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(keys, columns);
        assert_eq!(dict["state"], "offline");
        assert_eq!(dict["ip"], "10.0.0.1");
        assert_eq!(dict["remote_ip"], "192.168.0.10");
        assert_eq!(dict["port"], 1024);
        assert_eq!(dict["id"], agent.id().to_string());
    }

    #[test]
    fn test_to_schema() {
        let schema = Agent::to_schema();
        assert_eq!(schema.len(), Agent::COLUMNS.len());
        assert_eq!(schema["hostname"], "VARCHAR(255)");
        assert_eq!(schema["state"], "AgentStateEnum");
        assert_eq!(schema["ram_allocation"], "FLOAT");
    }

    #[test]
    fn test_display() {
        let agent = agent();
        let shown = agent.to_string();
        assert!(shown.starts_with("Agent(id=\"agt_"));
        assert!(shown.ends_with(r#"hostname="foobar00", ip="10.0.0.1", port=1024, state="offline")"#));
    }

    #[test]
    fn test_software_unique_per_agent() {
        let mut agent = agent();
        agent.attach_software(Software::new("foo", "1.0.0")).unwrap();
        assert!(matches!(
            agent.attach_software(Software::new("foo", "1.0.0")),
            Err(Error::DuplicateCapability { .. })
        ));
        assert_eq!(agent.software().len(), 1);
    }

    #[test]
    fn test_decode_round_trip() {
        let mut agent = agent();
        agent.attach_tag(Tag::new("gpu"));
        agent.set_state(AgentState::Online);

        let value = serde_json::to_value(&agent).unwrap();
        let decoded: Agent = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, agent);
    }

    #[test]
    fn test_decode_rejects_out_of_domain_fields() {
        let valid = serde_json::to_value(agent()).unwrap();
        for (field, bad) in [
            ("hostname", serde_json::json!("foo/bar")),
            ("ip", serde_json::json!("127.0.0.1")),
            ("remote_ip", serde_json::json!("169.254.3.4")),
            ("port", serde_json::json!(1)),
            ("cpus", serde_json::json!(0)),
            ("ram", serde_json::json!(8)),
            ("free_ram", serde_json::json!(-1)),
            ("ram_allocation", serde_json::json!(7.5)),
            ("cpu_allocation", serde_json::json!(-0.5)),
            ("state", serde_json::json!("asleep")),
        ] {
            let mut value = valid.clone();
            value[field] = bad;
            assert!(
                serde_json::from_value::<Agent>(value).is_err(),
                "{field} accepted"
            );
        }
    }

    #[test]
    fn test_from_stored_uses_given_limits() {
        let mut value = serde_json::to_value(agent()).unwrap();
        value["cpus"] = serde_json::json!(512);
        let stored: StoredAgent = serde_json::from_value(value).unwrap();

        let mut limits = AgentLimits::default();
        limits.cpus.max = 1024;
        assert_eq!(Agent::from_stored(&limits, stored.clone()).unwrap().cpus(), 512);
        assert!(Agent::from_stored(&AgentLimits::default(), stored).is_err());
    }
}
