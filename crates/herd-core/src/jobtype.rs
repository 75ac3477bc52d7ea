//! Job types: named, versionable job implementations.
//!
//! The code is stored verbatim; it is never parsed or run here.

use crate::ids::JobTypeId;
use crate::record::{Column, ColumnType, ColumnValue, Record, id_value, to_value};
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How an agent obtains the job type's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobTypeLoadMode {
    Download,
    Open,
    Import,
}

impl JobTypeLoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobTypeLoadMode::Download => "download",
            JobTypeLoadMode::Open => "open",
            JobTypeLoadMode::Import => "import",
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            JobTypeLoadMode::Download => 1,
            JobTypeLoadMode::Open => 2,
            JobTypeLoadMode::Import => 3,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(JobTypeLoadMode::Download),
            2 => Ok(JobTypeLoadMode::Open),
            3 => Ok(JobTypeLoadMode::Import),
            other => Err(Error::Validation {
                field: "mode",
                reason: format!("{other} is not a valid load mode"),
            }),
        }
    }
}

impl ColumnValue for JobTypeLoadMode {
    fn column_value(&self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobType {
    id: JobTypeId,
    pub name: String,
    pub description: Option<String>,
    pub classname: Option<String>,
    pub code: String,
    mode: JobTypeLoadMode,
}

impl JobType {
    pub fn new(name: impl Into<String>, code: impl Into<String>, mode: JobTypeLoadMode) -> Self {
        Self {
            id: JobTypeId::new(),
            name: name.into(),
            description: None,
            classname: None,
            code: code.into(),
            mode,
        }
    }

    pub fn id(&self) -> JobTypeId {
        self.id
    }

    pub fn mode(&self) -> JobTypeLoadMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: JobTypeLoadMode) {
        self.mode = mode;
    }

    pub fn set_mode_code(&mut self, code: i32) -> Result<()> {
        self.mode = JobTypeLoadMode::from_code(code)?;
        Ok(())
    }
}

impl Record for JobType {
    const NAME: &'static str = "JobType";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnType::Id),
        Column::new("name", ColumnType::String(64)),
        Column::new("description", ColumnType::Text),
        Column::new("classname", ColumnType::String(64)),
        Column::new("code", ColumnType::Text),
        Column::new("mode", ColumnType::Enum("JobTypeLoadModeEnum")),
    ];
    const REPR_COLUMNS: &'static [&'static str] = &["id", "name", "mode"];

    fn column(&self, name: &str) -> Value {
        match name {
            "id" => id_value(&self.id),
            "name" => to_value(&self.name),
            "description" => to_value(&self.description),
            "classname" => to_value(&self.classname),
            "code" => to_value(&self.code),
            "mode" => to_value(&self.mode),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}
