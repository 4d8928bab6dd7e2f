//! Engine configuration (spec §6): the six recognized knobs, loaded from a
//! TOML document. Unknown options are rejected at startup with a
//! `Configuration` error — fatal, per the error-handling design (§7).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warn
    }
}

fn default_cache_size() -> usize {
    128
}

fn default_true() -> bool {
    true
}

/// The recognized configuration surface. Deserialized with `deny_unknown_fields`
/// so an unrecognized key fails the way the spec requires rather than being
/// silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    pub data_root: Option<PathBuf>,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_true")]
    pub enable_validation: bool,
    pub log_level: LogLevel,
    #[serde(default = "default_true")]
    pub hooks_enabled: bool,
    pub hook_plugins: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            data_root: None,
            cache_size: default_cache_size(),
            enable_validation: true,
            log_level: LogLevel::default(),
            hooks_enabled: true,
            hook_plugins: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document into a config. An unrecognized key, or a
    /// `cache_size` that doesn't fit `usize` (i.e. is negative), is a
    /// `Configuration` error.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            BceError::Configuration(format!("invalid configuration: {e}"))
        })
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}
