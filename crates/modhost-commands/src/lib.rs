//! Runtime command registration for modhost.
//!
//! Provides:
//! - Host adapters resolving the host's dispatch table per host version
//! - The shared dispatch table
//! - Atomic register/unregister with alias ownership checks
//! - An execution shell that keeps every failure away from the host
//! - `ExtensionHost`, the facade modules use

pub mod adapter;
pub mod host;
pub mod registry;
pub mod shell;
pub mod spec;
pub mod table;

// Re-exports
pub use adapter::{parse_host_version, AdapterSet, HostAdapter, HostError, StandardAdapter};

pub use host::ExtensionHost;

pub use registry::{Capabilities, CommandRegistry, RegistryError};

pub use shell::{
    handler_fn, Command, CommandExecutor, CommandHandler, ExecutionContext, Outcome,
    INTERACTIVE_ONLY,
};

pub use spec::CommandSpec;

pub use table::{Binding, DispatchTable, TableEntries};
