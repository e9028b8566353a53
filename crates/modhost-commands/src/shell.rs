//! Command execution.
//!
//! A [`Command`] wraps a handler body. Executing it never lets a failure
//! reach the host: user-facing failures go back to the sender (or the
//! console log for non-interactive senders), everything else goes to the
//! diagnostic writer. Panics in the body are caught and treated as
//! internal failures.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use modhost_core::{
    command_context, CommandError, CommandSender, ConsoleLogger, DiagnosticWriter, Failure,
    LogLevel, Messenger, UserFacingFailure,
};

use crate::registry::Capabilities;
use crate::spec::CommandSpec;

/// Text of the failure raised by [`ExecutionContext::require_interactive`].
pub const INTERACTIVE_ONLY: &str = "This command can only be executed by interactive senders.";

/// Per-invocation state handed to the handler body.
pub struct ExecutionContext<'a> {
    sender: &'a dyn CommandSender,
    label: &'a str,
    args: &'a [String],
    messenger: &'a Messenger,
}

impl<'a> ExecutionContext<'a> {
    pub fn sender(&self) -> &'a dyn CommandSender {
        self.sender
    }

    /// The label the command was invoked with (name or alias).
    pub fn label(&self) -> &'a str {
        self.label
    }

    pub fn args(&self) -> &'a [String] {
        self.args
    }

    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn is_interactive(&self) -> bool {
        self.sender.is_interactive()
    }

    /// Fail with a user-facing message unless the sender is interactive.
    pub fn require_interactive(&self) -> Result<(), CommandError> {
        if self.is_interactive() {
            Ok(())
        } else {
            Err(UserFacingFailure::new(INTERACTIVE_ONLY).into())
        }
    }

    pub fn messenger(&self) -> &'a Messenger {
        self.messenger
    }

    /// Send an info message to the sender.
    pub fn reply(&self, text: &str) {
        self.messenger.info(self.sender, text);
    }
}

/// A command body.
pub trait CommandHandler: Send + Sync {
    fn on_command(&self, ctx: &ExecutionContext<'_>) -> Result<(), CommandError>;
}

impl<F> CommandHandler for F
where
    F: Fn(&ExecutionContext<'_>) -> Result<(), CommandError> + Send + Sync,
{
    fn on_command(&self, ctx: &ExecutionContext<'_>) -> Result<(), CommandError> {
        self(ctx)
    }
}

/// Helper that pins down a closure's signature as a handler.
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&ExecutionContext<'_>) -> Result<(), CommandError> + Send + Sync + 'static,
{
    f
}

/// How an invocation ended. Every outcome counts as handled for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    UserFacingFailure,
    InternalFailure,
}

impl Outcome {
    /// Always `true`: failures are terminal inside the shell.
    pub fn handled(&self) -> bool {
        true
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

/// What the host's dispatch table invokes.
pub trait CommandExecutor: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, sender: &dyn CommandSender, label: &str, args: &[String]) -> Outcome;
}

pub(crate) struct CommandShell {
    spec: CommandSpec,
    handler: Box<dyn CommandHandler>,
    messenger: Arc<Messenger>,
    console: Arc<ConsoleLogger>,
    diagnostics: Arc<DiagnosticWriter>,
    capabilities: Option<Capabilities>,
}

impl CommandShell {
    fn deliver(&self, sender: &dyn CommandSender, failure: &UserFacingFailure) {
        if failure.is_silent() {
            return;
        }
        if sender.is_interactive() {
            self.messenger.error_all(sender, failure.messages());
        } else {
            self.console.log(LogLevel::Warning, failure.messages());
        }
    }
}

impl CommandExecutor for CommandShell {
    fn name(&self) -> &str {
        self.spec.name()
    }

    fn execute(&self, sender: &dyn CommandSender, label: &str, args: &[String]) -> Outcome {
        tracing::debug!(command = %self.spec.name(), label, sender = sender.name(), "Executing command");

        let ctx = ExecutionContext {
            sender,
            label,
            args,
            messenger: &self.messenger,
        };

        let error = match panic::catch_unwind(AssertUnwindSafe(|| self.handler.on_command(&ctx))) {
            Ok(Ok(())) => return Outcome::Completed,
            Ok(Err(err)) => err,
            Err(payload) => CommandError::Internal(Failure::from_panic(payload)),
        };

        match error {
            CommandError::UserFacing(failure) => {
                self.deliver(sender, &failure);
                Outcome::UserFacingFailure
            }
            CommandError::Internal(failure) => {
                self.diagnostics.error(&failure, &[command_context(label)]);
                Outcome::InternalFailure
            }
        }
    }
}

/// A command ready to be registered. Cheap to clone.
#[derive(Clone)]
pub struct Command {
    shell: Arc<CommandShell>,
}

impl Command {
    pub(crate) fn new(
        spec: CommandSpec,
        handler: Box<dyn CommandHandler>,
        messenger: Arc<Messenger>,
        console: Arc<ConsoleLogger>,
        diagnostics: Arc<DiagnosticWriter>,
        capabilities: Option<Capabilities>,
    ) -> Self {
        Self {
            shell: Arc::new(CommandShell {
                spec,
                handler,
                messenger,
                console,
                diagnostics,
                capabilities,
            }),
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.shell.spec
    }

    pub fn name(&self) -> &str {
        self.shell.spec.name()
    }

    /// `true` when host capabilities were unavailable at construction.
    pub fn is_inert(&self) -> bool {
        self.shell.capabilities.is_none()
    }

    pub(crate) fn capabilities(&self) -> Option<&Capabilities> {
        self.shell.capabilities.as_ref()
    }

    pub fn executor(&self) -> Arc<dyn CommandExecutor> {
        self.shell.clone()
    }

    /// Run the handler. Never panics and never returns an error.
    pub fn execute(&self, sender: &dyn CommandSender, label: &str, args: &[String]) -> Outcome {
        self.shell.execute(sender, label, args)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("spec", &self.shell.spec)
            .field("inert", &self.is_inert())
            .finish()
    }
}
