//! Failure classification.
//!
//! Command bodies return [`CommandError`]. A [`UserFacingFailure`] is an
//! expected, caller-caused outcome whose text goes back to the caller; an
//! internal [`Failure`] is unexpected and ends up in a diagnostic report.

use std::fmt;

use thiserror::Error;

use crate::failure::Failure;

/// Expected failure carrying text for the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFacingFailure {
    messages: Vec<String>,
}

impl UserFacingFailure {
    /// Failure with a single display message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    /// Failure with several display messages, delivered in order.
    pub fn with_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// Failure that aborts the command without telling the caller anything.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_silent(&self) -> bool {
        self.messages.is_empty()
    }
}

impl fmt::Display for UserFacingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages.join("; "))
    }
}

impl std::error::Error for UserFacingFailure {}

/// Result of a command body.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Expected failure, shown to the caller
    #[error("{0}")]
    UserFacing(UserFacingFailure),

    /// Unexpected failure, captured into a diagnostic report
    #[error("{0}")]
    Internal(Failure),
}

impl CommandError {
    /// Shorthand for a user-facing failure with one message.
    pub fn user(message: impl Into<String>) -> Self {
        CommandError::UserFacing(UserFacingFailure::new(message))
    }

    pub fn class(&self) -> FailureClass {
        classify(self)
    }
}

impl From<UserFacingFailure> for CommandError {
    fn from(failure: UserFacingFailure) -> Self {
        CommandError::UserFacing(failure)
    }
}

impl From<Failure> for CommandError {
    fn from(failure: Failure) -> Self {
        CommandError::Internal(failure)
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(user) = err.downcast_ref::<UserFacingFailure>() {
            return CommandError::UserFacing(user.clone());
        }
        CommandError::Internal(Failure::from_anyhow(&err))
    }
}

/// How a failure is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Messages go to the caller, nothing is persisted
    UserFacing,
    /// Already reported when raised; skip the explicit report
    SelfReporting,
    /// Needs an explicit diagnostic report
    Unexpected,
}

/// Classify a command error.
pub fn classify(error: &CommandError) -> FailureClass {
    match error {
        CommandError::UserFacing(_) => FailureClass::UserFacing,
        CommandError::Internal(failure) => classify_failure(failure),
    }
}

/// Classify an internal failure.
pub fn classify_failure(failure: &Failure) -> FailureClass {
    if failure.is_self_reporting() {
        FailureClass::SelfReporting
    } else {
        FailureClass::Unexpected
    }
}

impl Failure {
    pub fn class(&self) -> FailureClass {
        classify_failure(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&CommandError::user("Not enough permissions")),
            FailureClass::UserFacing
        );
        assert_eq!(
            classify(&Failure::new("Boom", "x").into()),
            FailureClass::Unexpected
        );
        assert_eq!(
            classify(&Failure::self_reporting("x").into()),
            FailureClass::SelfReporting
        );
    }

    #[test]
    fn test_user_facing_messages() {
        let failure = UserFacingFailure::with_messages(["Usage: /heal <player>", "Try again"]);
        assert_eq!(failure.messages().len(), 2);
        assert!(!failure.is_silent());
        assert!(UserFacingFailure::silent().is_silent());
    }

    #[test]
    fn test_anyhow_keeps_user_facing() {
        let err = anyhow::Error::new(UserFacingFailure::new("Target not found"));
        let converted: CommandError = err.into();
        assert!(matches!(converted, CommandError::UserFacing(ref f) if f.messages() == ["Target not found"]));

        let converted: CommandError = anyhow::anyhow!("socket closed").into();
        assert_eq!(converted.class(), FailureClass::Unexpected);
    }
}
