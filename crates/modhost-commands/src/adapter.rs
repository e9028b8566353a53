//! Host adapters.
//!
//! Reaching the host's dispatch table and its install operation is specific
//! to each host version. Every such lookup lives behind [`HostAdapter`];
//! [`AdapterSet`] picks the adapter matching the running host.

use std::sync::{Arc, Weak};

use semver::{Version, VersionReq};

use crate::table::{Binding, DispatchTable, TableEntries};

/// Host adapter error types.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Unsupported host version: {0}")]
    UnsupportedVersion(String),

    #[error("No host adapter supports version {0}")]
    NoAdapter(String),

    #[error("Dispatch table unavailable: {0}")]
    TableUnavailable(String),

    #[error("Host rejected binding for '{label}': {reason}")]
    BindingRejected { label: String, reason: String },
}

/// Version-specific access to the host's command plumbing.
pub trait HostAdapter: Send + Sync {
    fn id(&self) -> &str;

    /// Whether this adapter understands the given host version.
    fn supports(&self, version: &Version) -> bool;

    /// Handle to the host's dispatch table.
    fn dispatch_table(&self) -> Result<Arc<DispatchTable>, HostError>;

    /// The host's own install operation. Called with the table's write guard held.
    fn install_binding(
        &self,
        entries: &mut TableEntries,
        label: &str,
        binding: Binding,
    ) -> Result<(), HostError>;
}

/// Adapter for hosts that hand out their [`DispatchTable`] directly.
#[derive(Debug, Clone)]
pub struct StandardAdapter {
    id: String,
    requirement: VersionReq,
    table: Weak<DispatchTable>,
}

impl StandardAdapter {
    pub fn new(id: impl Into<String>, table: &Arc<DispatchTable>, requirement: VersionReq) -> Self {
        Self {
            id: id.into(),
            requirement,
            table: Arc::downgrade(table),
        }
    }

    /// Adapter accepting every host version.
    pub fn any_version(table: &Arc<DispatchTable>) -> Self {
        Self::new("standard", table, VersionReq::STAR)
    }
}

impl HostAdapter for StandardAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, version: &Version) -> bool {
        self.requirement.matches(version)
    }

    fn dispatch_table(&self) -> Result<Arc<DispatchTable>, HostError> {
        self.table
            .upgrade()
            .ok_or_else(|| HostError::TableUnavailable("host dropped its dispatch table".to_string()))
    }

    fn install_binding(
        &self,
        entries: &mut TableEntries,
        label: &str,
        binding: Binding,
    ) -> Result<(), HostError> {
        entries.insert(label.to_string(), binding);
        Ok(())
    }
}

/// Candidate adapters, checked in insertion order.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: Vec<Arc<dyn HostAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: impl HostAdapter + 'static) -> Self {
        self.push(Arc::new(adapter));
        self
    }

    pub fn push(&mut self, adapter: Arc<dyn HostAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// First adapter supporting `host_version`.
    pub fn select(&self, host_version: &str) -> Result<Arc<dyn HostAdapter>, HostError> {
        let version = parse_host_version(host_version)?;
        self.adapters
            .iter()
            .find(|adapter| adapter.supports(&version))
            .cloned()
            .ok_or_else(|| HostError::NoAdapter(host_version.to_string()))
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.adapters.iter().map(|a| a.id().to_string()))
            .finish()
    }
}

/// Parse a host version, accepting the `major.minor` shorthand.
pub fn parse_host_version(raw: &str) -> Result<Version, HostError> {
    let raw = raw.trim();
    if let Ok(version) = Version::parse(raw) {
        return Ok(version);
    }
    let (core, rest) = match raw.find(['-', '+']) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    };
    if core.split('.').count() == 2 {
        if let Ok(version) = Version::parse(&format!("{}.0{}", core, rest)) {
            return Ok(version);
        }
    }
    Err(HostError::UnsupportedVersion(raw.to_string()))
}
