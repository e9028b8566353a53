//! Host and module facts included in diagnostic reports.

use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Name and version of a loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub version: String,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// Point-in-time view of the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// The module this runtime belongs to
    pub module: ModuleDescriptor,
    pub host_name: String,
    pub host_version: String,
    pub runtime_version: String,
    pub loaded_modules: Vec<ModuleDescriptor>,
}

impl EnvironmentSnapshot {
    /// `Running <host> <version> and Rust <runtime>`
    pub fn system_line(&self) -> String {
        format!(
            "Running {} {} and Rust {}",
            self.host_name, self.host_version, self.runtime_version
        )
    }

    /// `[a v1, b v2]`
    pub fn modules_line(&self) -> String {
        let names: Vec<String> = self.loaded_modules.iter().map(ToString::to_string).collect();
        format!("[{}]", names.join(", "))
    }
}

/// Source of environment facts.
pub trait Environment: Send + Sync {
    fn snapshot(&self) -> EnvironmentSnapshot;
}

/// Runtime version reported when the host does not supply one.
pub fn default_runtime_version() -> String {
    match option_env!("CARGO_PKG_RUST_VERSION") {
        Some(version) if !version.is_empty() => version.to_string(),
        _ => "unknown".to_string(),
    }
}

/// Environment with fixed host facts and a mutable module list.
#[derive(Debug)]
pub struct StaticEnvironment {
    module: ModuleDescriptor,
    host_name: String,
    host_version: String,
    runtime_version: String,
    loaded_modules: RwLock<Vec<ModuleDescriptor>>,
}

impl StaticEnvironment {
    pub fn new(
        module: ModuleDescriptor,
        host_name: impl Into<String>,
        host_version: impl Into<String>,
    ) -> Self {
        Self {
            loaded_modules: RwLock::new(vec![module.clone()]),
            module,
            host_name: host_name.into(),
            host_version: host_version.into(),
            runtime_version: default_runtime_version(),
        }
    }

    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = version.into();
        self
    }

    pub fn module(&self) -> &ModuleDescriptor {
        &self.module
    }

    pub fn add_module(&self, module: ModuleDescriptor) {
        let mut modules = self.loaded_modules.write();
        if !modules.contains(&module) {
            modules.push(module);
        }
    }

    pub fn remove_module(&self, name: &str) {
        self.loaded_modules.write().retain(|m| m.name != name);
    }
}

impl Environment for StaticEnvironment {
    fn snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            module: self.module.clone(),
            host_name: self.host_name.clone(),
            host_version: self.host_version.clone(),
            runtime_version: self.runtime_version.clone(),
            loaded_modules: self.loaded_modules.read().clone(),
        }
    }
}
