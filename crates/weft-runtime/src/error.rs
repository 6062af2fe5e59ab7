use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Commit phase a lifecycle hook ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Created,
    Updated,
    Destroyed,
    InstallModifier,
    UpdateModifier,
}

impl Phase {
    /// Flush order of a commit.
    pub const ORDER: [Phase; 5] = [
        Phase::Created,
        Phase::Updated,
        Phase::Destroyed,
        Phase::InstallModifier,
        Phase::UpdateModifier,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Created => "did_create",
            Phase::Updated => "did_update",
            Phase::Destroyed => "destroy",
            Phase::InstallModifier => "install_modifier",
            Phase::UpdateModifier => "update_modifier",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Collaborator contract violation at the resolver boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("{method} not implemented on the resolver")]
    NotImplemented { method: &'static str },

    #[error("unexpected {what} `{name}` (from {referrer}): {method} returned nothing")]
    Unresolved {
        what: &'static str,
        method: &'static str,
        name: String,
        referrer: String,
    },

    #[error("unexpected handle {handle}: resolve returned nothing")]
    UnresolvedHandle { handle: u32 },

    #[error("unable to compile {locator}: compilable returned nothing")]
    Uncompilable { locator: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("a transaction is already open on this thread")]
    TransactionAlreadyOpen,

    #[error("no transaction is open; lifecycle effects must be queued inside begin()/commit()")]
    NoTransaction,

    #[error("cannot access slot ${index} of scope; length={len}")]
    SlotOutOfRange { index: usize, len: usize },

    #[error("{phase} hook failed: {source}")]
    Hook {
        phase: Phase,
        #[source]
        source: HookError,
    },

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Reference(#[from] weft_reference::ReferenceError),
}

impl RuntimeError {
    #[must_use]
    pub fn hook(phase: Phase, source: HookError) -> Self {
        Self::Hook { phase, source }
    }

    /// Whether the error reports misuse of the runtime rather than a failure
    /// of a collaborator.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::TransactionAlreadyOpen
                | Self::NoTransaction
                | Self::SlotOutOfRange { .. }
                | Self::Reference(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = RuntimeError::SlotOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "cannot access slot $4 of scope; length=2");
        assert!(err.is_programming_error());

        let err = RuntimeError::hook(Phase::Destroyed, HookError::new("boom"));
        assert_eq!(err.to_string(), "destroy hook failed: boom");
        assert!(!err.is_programming_error());

        let err = RuntimeError::from(ResolverError::Unresolved {
            what: "component",
            method: "lookup_component",
            name: "x-foo".into(),
            referrer: "app".into(),
        });
        assert_eq!(
            err.to_string(),
            "unexpected component `x-foo` (from app): lookup_component returned nothing"
        );
    }

    #[test]
    fn phase_order_matches_commit_order() {
        assert_eq!(Phase::ORDER[0], Phase::Created);
        assert_eq!(Phase::ORDER[4], Phase::UpdateModifier);
        assert_eq!(Phase::InstallModifier.to_string(), "install_modifier");
    }
}
