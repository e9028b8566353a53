//! The host-owned dispatch table.
//!
//! Maps every label (command name or alias) to a [`Binding`]. The table is
//! shared with the host: anyone mutating it, the host included, does so
//! through the exclusive guard returned by [`DispatchTable::write`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use modhost_core::CommandSender;
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::shell::{CommandExecutor, Outcome};
use crate::spec::normalize;

/// Opaque record the host keeps per label.
#[derive(Clone)]
pub struct Binding {
    owner: String,
    executor: Arc<dyn CommandExecutor>,
}

impl Binding {
    /// Binding owned by the command whose primary name is `owner`.
    pub fn new(owner: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            owner: owner.into(),
            executor,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("owner", &self.owner).finish()
    }
}

/// Label to binding map.
pub type TableEntries = HashMap<String, Binding>;

/// Shared dispatch table.
#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: RwLock<TableEntries>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access for a read-modify-write sequence.
    pub fn write(&self) -> RwLockWriteGuard<'_, TableEntries> {
        self.entries.write()
    }

    /// Owner of the binding for `label`.
    pub fn owner_of(&self, label: &str) -> Option<String> {
        self.entries
            .read()
            .get(&normalize(label.to_string()))
            .map(|b| b.owner.clone())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.read().contains_key(&normalize(label.to_string()))
    }

    /// All labels, sorted.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.entries.read().keys().cloned().collect();
        labels.sort();
        labels
    }

    /// Label to owner map, taken under a single read lock.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .read()
            .iter()
            .map(|(label, binding)| (label.clone(), binding.owner.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Run the command bound to `label`. `None` if nothing is bound.
    ///
    /// Lookup ignores case; the handler sees `label` as typed. The lock is
    /// released before the command runs, so handlers may register or
    /// unregister commands.
    pub fn dispatch(&self, sender: &dyn CommandSender, label: &str, args: &[String]) -> Option<Outcome> {
        let key = normalize(label.to_string());
        let executor = self.entries.read().get(&key).map(|b| b.executor.clone())?;
        Some(executor.execute(sender, label, args))
    }
}
