//! Command registry.
//!
//! Binds commands into the host's dispatch table. Host capabilities are
//! resolved once, on the first command construction; if that fails the
//! failure is reported and every command built afterwards is inert.
//!
//! Register and unregister each run under one write guard of the table, so
//! a concurrent reader sees either all of a command's labels or none.

use std::sync::Arc;

use modhost_core::{DiagnosticWriter, Environment, Failure};
use once_cell::sync::OnceCell;

use crate::adapter::{AdapterSet, HostAdapter, HostError};
use crate::shell::Command;
use crate::spec::CommandSpec;
use crate::table::{Binding, DispatchTable, TableEntries};

/// Registry error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Command '{0}' is inert: host capabilities could not be resolved")]
    Inert(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Resolved access to the host: its table and the adapter that installs into it.
#[derive(Clone)]
pub struct Capabilities {
    adapter: Arc<dyn HostAdapter>,
    table: Arc<DispatchTable>,
}

impl Capabilities {
    pub fn adapter_id(&self) -> &str {
        self.adapter.id()
    }

    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }
}

/// Owns the binding logic between commands and the host table.
pub struct CommandRegistry {
    adapters: AdapterSet,
    environment: Arc<dyn Environment>,
    diagnostics: Arc<DiagnosticWriter>,
    capabilities: OnceCell<Option<Capabilities>>,
}

impl CommandRegistry {
    pub fn new(
        adapters: AdapterSet,
        environment: Arc<dyn Environment>,
        diagnostics: Arc<DiagnosticWriter>,
    ) -> Self {
        Self {
            adapters,
            environment,
            diagnostics,
            capabilities: OnceCell::new(),
        }
    }

    /// Resolved capabilities, resolving them on first use.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities
            .get_or_init(|| match self.resolve() {
                Ok(capabilities) => {
                    tracing::debug!(adapter = capabilities.adapter_id(), "Resolved host capabilities");
                    Some(capabilities)
                }
                Err(err) => {
                    self.diagnostics.report(
                        &Failure::from_error(&err),
                        &["Failed to resolve host capabilities; commands will be inert"],
                    );
                    None
                }
            })
            .clone()
    }

    /// Whether resolution has been attempted.
    pub fn is_resolved(&self) -> bool {
        self.capabilities.get().is_some()
    }

    fn resolve(&self) -> Result<Capabilities, HostError> {
        let host_version = self.environment.snapshot().host_version;
        let adapter = self.adapters.select(&host_version)?;
        let table = adapter.dispatch_table()?;
        Ok(Capabilities { adapter, table })
    }

    /// Bind the command's name and aliases, replacing its previous bindings.
    ///
    /// On failure the table is left exactly as it was.
    pub fn register(&self, command: &Command) -> Result<(), RegistryError> {
        let capabilities = command
            .capabilities()
            .ok_or_else(|| RegistryError::Inert(command.name().to_string()))?;
        let spec = command.spec();
        let binding = Binding::new(spec.name(), command.executor());

        let mut entries = capabilities.table.write();
        let previous: Vec<(String, Option<Binding>)> = spec
            .labels()
            .map(|label| (label.to_string(), entries.get(label).cloned()))
            .collect();

        unbind(&mut entries, spec);
        for label in spec.labels() {
            if let Err(err) = capabilities
                .adapter
                .install_binding(&mut entries, label, binding.clone())
            {
                restore(&mut entries, previous);
                return Err(err.into());
            }
        }

        tracing::debug!(command = spec.name(), aliases = ?spec.aliases(), "Registered command");
        Ok(())
    }

    /// Remove the command's name binding and every alias it still owns.
    pub fn unregister(&self, command: &Command) -> Result<(), RegistryError> {
        let capabilities = command
            .capabilities()
            .ok_or_else(|| RegistryError::Inert(command.name().to_string()))?;

        unbind(&mut capabilities.table.write(), command.spec());

        tracing::debug!(command = command.name(), "Unregistered command");
        Ok(())
    }

    /// Owner of the binding for `label`, if capabilities are available.
    pub fn owner_of(&self, label: &str) -> Option<String> {
        self.capabilities()?.table.owner_of(label)
    }
}

fn unbind(entries: &mut TableEntries, spec: &CommandSpec) {
    entries.remove(spec.name());
    for alias in spec.aliases() {
        let owned = entries
            .get(alias)
            .is_some_and(|binding| binding.owner() == spec.name());
        if owned {
            entries.remove(alias);
        }
    }
}

fn restore(entries: &mut TableEntries, previous: Vec<(String, Option<Binding>)>) {
    for (label, binding) in previous {
        match binding {
            Some(binding) => {
                entries.insert(label, binding);
            }
            None => {
                entries.remove(&label);
            }
        }
    }
}
