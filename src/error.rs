//! Structured error/warning surface for the engine.
//!
//! Every public operation returns a value or fails with a [`BceError`]; errors
//! are classified by kind, never stringly typed, matching the six error kinds
//! of the core's error design.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single ingestion validation failure, keyed by the entity and field that
/// produced it so that a `load_all` run can report every violation in one
/// pass rather than failing on the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub entity_id: String,
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        entity_id: impl Into<String>,
        field_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationError {
            entity_id: entity_id.into(),
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.entity_id, self.field_path, self.message)
    }
}

/// A non-fatal ingestion observation (unknown trait key, hook abort, etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub entity_id: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(entity_id: Option<String>, message: impl Into<String>) -> Self {
        Warning {
            entity_id,
            message: message.into(),
        }
    }
}

/// The classified error surface of the core. Each variant corresponds to one
/// of the error kinds in the engine's error-handling design: data not found,
/// validation, storage, cache, configuration, search.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum BceError {
    #[error("entity not found: {0}")]
    DataNotFound(String),

    #[error("validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("search error: {0}")]
    Search(String),
}

impl BceError {
    pub fn kind(&self) -> &'static str {
        match self {
            BceError::DataNotFound(_) => "DataNotFound",
            BceError::Validation(_) => "Validation",
            BceError::Storage(_) => "Storage",
            BceError::Cache(_) => "Cache",
            BceError::Configuration(_) => "Configuration",
            BceError::Search(_) => "Search",
        }
    }

    pub fn aborted_by_hook(point: &str) -> Self {
        BceError::DataNotFound(format!("operation aborted by hook at {point}"))
    }

    pub fn save_aborted_by_hook(point: &str) -> Self {
        BceError::Storage(format!("save refused: aborted by hook at {point}"))
    }
}

impl From<io::Error> for BceError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => BceError::DataNotFound(format!("{err}")),
            _ => BceError::Storage(format!("{err}")),
        }
    }
}

impl From<toml::de::Error> for BceError {
    fn from(err: toml::de::Error) -> Self {
        BceError::Storage(format!("toml deserialization error: {err}"))
    }
}

impl From<toml::ser::Error> for BceError {
    fn from(err: toml::ser::Error) -> Self {
        BceError::Storage(format!("toml serialization error: {err}"))
    }
}

impl From<serde_json::Error> for BceError {
    fn from(err: serde_json::Error) -> Self {
        BceError::Storage(format!("json (de)serialization error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, BceError>;
