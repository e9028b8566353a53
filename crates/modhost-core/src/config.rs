//! Runtime configuration.
//!
//! Built once by the embedding host and passed to constructors. Values can
//! come from defaults, a TOML file and a few environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::messenger::MessagePrefixes;

/// Default report file name inside the data directory.
pub const DEFAULT_REPORT_FILE: &str = "error.txt";

/// Host-internal frames kept before a trace is truncated.
pub const DEFAULT_CONTEXT_FRAMES: usize = 6;

/// Environment variable names.
pub mod env_vars {
    pub const AUTO_REPORT: &str = "MODHOST_AUTO_REPORT";
    pub const DATA_DIR: &str = "MODHOST_DATA_DIR";
    pub const LOG_PREFIX: &str = "MODHOST_LOG_PREFIX";
}

/// Stack-trace filtering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Symbol prefix of the host's internal implementation
    pub host_namespace: String,
    /// Thread entry points, treated like host-internal frames
    pub runtime_namespaces: Vec<String>,
    /// Symbol fragments of dynamic-invocation shims, dropped at every depth
    pub reflection_namespaces: Vec<String>,
    /// Frames walked before host-internal frames end the trace
    pub context_frames: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            host_namespace: "std::rt".to_string(),
            runtime_namespaces: vec!["std::thread".to_string(), "std::sys".to_string()],
            reflection_namespaces: vec![
                "<unknown>".to_string(),
                "core::ops::function".to_string(),
                "std::panicking".to_string(),
                "std::panic::catch_unwind".to_string(),
                "__rust_begin_short_backtrace".to_string(),
            ],
            context_frames: DEFAULT_CONTEXT_FRAMES,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModhostConfig {
    /// Report self-reporting failures when they are raised
    pub auto_report: bool,
    /// Console prefix. `None` means `[<module name>] `.
    pub log_prefix: Option<String>,
    /// Module-owned data directory holding the report file
    pub data_dir: PathBuf,
    pub report_file: String,
    pub trace: TraceConfig,
    pub messages: MessagePrefixes,
}

impl Default for ModhostConfig {
    fn default() -> Self {
        Self {
            auto_report: true,
            log_prefix: None,
            data_dir: PathBuf::from("data"),
            report_file: DEFAULT_REPORT_FILE.to_string(),
            trace: TraceConfig::default(),
            messages: MessagePrefixes::default(),
        }
    }
}

impl ModhostConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Apply `MODHOST_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(value) = lookup(env_vars::AUTO_REPORT) {
            self.auto_report = parse_bool(&value).ok_or(ConfigError::InvalidOverride {
                var: env_vars::AUTO_REPORT,
                value,
            })?;
        }
        if let Some(value) = lookup(env_vars::DATA_DIR) {
            self.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(env_vars::LOG_PREFIX) {
            self.log_prefix = Some(value);
        }
        Ok(self)
    }

    /// Prefix for console lines of the given module.
    pub fn log_prefix_for(&self, module_name: &str) -> String {
        self.log_prefix
            .clone()
            .unwrap_or_else(|| format!("[{}] ", module_name))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
