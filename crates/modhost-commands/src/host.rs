//! Extension host: the composition root modules talk to.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use modhost_core::{
    install_panic_hook, CommandError, CommandSender, ConsoleLogger, DiagnosticWriter, Environment,
    Failure, FileSink, LogLevel, LogSink, Messenger, ModhostConfig, ReportSink, TracingSink,
};

use crate::adapter::AdapterSet;
use crate::registry::{CommandRegistry, RegistryError};
use crate::shell::{Command, CommandHandler, Outcome};
use crate::spec::CommandSpec;

/// Wires configuration, logging, messaging, diagnostics and the registry.
pub struct ExtensionHost {
    config: ModhostConfig,
    environment: Arc<dyn Environment>,
    console: Arc<ConsoleLogger>,
    messenger: Arc<Messenger>,
    diagnostics: Arc<DiagnosticWriter>,
    registry: CommandRegistry,
}

impl ExtensionHost {
    /// Host with the default collaborators: `tracing` for the console and a
    /// report file under the configured data directory.
    pub fn new(config: ModhostConfig, environment: Arc<dyn Environment>, adapters: AdapterSet) -> Self {
        let sink = FileSink::new(config.data_dir.clone(), config.report_file.clone());
        Self::with_parts(
            config,
            environment,
            adapters,
            Arc::new(TracingSink),
            Arc::new(sink),
        )
    }

    /// Host with explicit console and report sinks. Installs the panic hook
    /// that lets panicking handlers be reported at their panic site.
    pub fn with_parts(
        config: ModhostConfig,
        environment: Arc<dyn Environment>,
        adapters: AdapterSet,
        log_sink: Arc<dyn LogSink>,
        report_sink: Arc<dyn ReportSink>,
    ) -> Self {
        install_panic_hook();
        let module_name = environment.snapshot().module.name;
        let console = Arc::new(ConsoleLogger::new(
            config.log_prefix_for(&module_name),
            log_sink,
        ));
        let messenger = Arc::new(Messenger::new(config.messages.clone()));
        let diagnostics = Arc::new(DiagnosticWriter::new(
            &config,
            environment.clone(),
            report_sink,
            console.clone(),
        ));
        let registry = CommandRegistry::new(adapters, environment.clone(), diagnostics.clone());

        Self {
            config,
            environment,
            console,
            messenger,
            diagnostics,
            registry,
        }
    }

    /// Build a command. The first call resolves host capabilities; if they
    /// are unavailable the command is returned inert.
    pub fn command(&self, spec: CommandSpec, handler: impl CommandHandler + 'static) -> Command {
        let capabilities = self.registry.capabilities();
        Command::new(
            spec,
            Box::new(handler),
            self.messenger.clone(),
            self.console.clone(),
            self.diagnostics.clone(),
            capabilities,
        )
    }

    /// Register a command. Failures are reported, not returned.
    pub fn register_command(&self, command: &Command) -> bool {
        self.registry_call(command, "register", self.registry.register(command))
    }

    /// Unregister a command. Failures are reported, not returned.
    pub fn unregister_command(&self, command: &Command) -> bool {
        self.registry_call(command, "unregister", self.registry.unregister(command))
    }

    fn registry_call(&self, command: &Command, action: &str, result: Result<(), RegistryError>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                self.diagnostics.report(
                    &Failure::from_error(&err),
                    &[format!("Failed to {} command: {}", action, command.name())],
                );
                false
            }
        }
    }

    /// Look up `label` in the host table and run it.
    pub fn dispatch(&self, sender: &dyn CommandSender, label: &str, args: &[String]) -> Option<Outcome> {
        self.registry
            .capabilities()?
            .table()
            .dispatch(sender, label, args)
    }

    /// Fire-and-forget diagnostic report.
    pub fn report_failure(
        &self,
        failure: Failure,
        context: Vec<String>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        self.diagnostics.spawn_report(failure, context)
    }

    /// Raise-time reporting for self-reporting failures.
    pub fn raise(&self, failure: Failure) -> Failure {
        self.diagnostics.raise(failure)
    }

    /// Run a start-up phase of a module. A failure is printed as a filtered
    /// trace (or logged, when user-facing) instead of propagating.
    pub fn guard<F>(&self, phase: &str, f: F) -> bool
    where
        F: FnOnce() -> Result<(), CommandError>,
    {
        let error = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => return true,
            Ok(Err(err)) => err,
            Err(payload) => CommandError::Internal(Failure::from_panic(payload)),
        };

        match error {
            CommandError::UserFacing(failure) => {
                self.console.log(LogLevel::Warning, failure.messages());
            }
            CommandError::Internal(failure) => {
                self.console
                    .log(LogLevel::Severe, &[format!("Module {} failed", phase)]);
                self.diagnostics.print_filtered_trace(&failure);
            }
        }
        false
    }

    pub fn config(&self) -> &ModhostConfig {
        &self.config
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }

    pub fn console(&self) -> &Arc<ConsoleLogger> {
        &self.console
    }

    pub fn messenger(&self) -> &Arc<Messenger> {
        &self.messenger
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticWriter> {
        &self.diagnostics
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }
}
