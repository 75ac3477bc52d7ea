//! Herd Core
//!
//! Data and lifecycle layer of the herd render farm: the work-item state
//! machine shared by jobs and tasks, priority bounds, agent field
//! validation, tag and software associations, and the dictionary/schema
//! views used for reporting. Persistence and transport are adapters that
//! plug in through [`ports`].

pub mod agent;
pub mod capability;
pub mod config;
pub mod error;
pub mod ids;
pub mod job;
pub mod jobtype;
pub mod lifecycle;
pub mod ports;
pub mod priority;
pub mod record;
pub mod state;
pub mod task;
pub mod validation;

pub use error::{Error, Result};
pub use ids::*;
pub use lifecycle::{StateChange, WorkItem, WorkLifecycle, WorkStateMachine};
pub use record::Record;
pub use state::{AgentState, WorkState};
