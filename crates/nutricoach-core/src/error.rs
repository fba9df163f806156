//! Failures of store and review operations that callers branch on.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    /// The row exists but its status does not allow the operation.
    #[error("{kind} {id} cannot be {action}: current status is {current} (must be {required})")]
    WrongStatus {
        kind: &'static str,
        id: Uuid,
        action: String,
        current: String,
        required: String,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl OperationError {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }
}
