use thiserror::Error;

/// Failure while computing a reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// The reference was read again while it was still computing.
    #[error("reference cycle: `{label}` depends on its own value")]
    Cycle { label: String },
}
