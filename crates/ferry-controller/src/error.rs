//! Reconcile errors and their classification
//!
//! Every pass error maps to an [`ErrorKind`]; the reconciler picks the
//! requeue delay from the kind alone. A plan that is gone when the pass
//! starts is not an error: the reconciler handles that at the fetch.

use crate::engine::EngineError;
use crate::store::StoreError;
use ferry_api::SnapshotError;
use ferry_inventory::InventoryError;

/// How a failed pass is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Dependencies or inventory not ready: slow requeue, not a failure
    NotReady,
    /// Plan could not be built: fast requeue
    Validation,
    /// Store, transport, inventory or engine failure: fast requeue
    Persistence,
}

impl ErrorKind {
    /// Metric label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotReady => "not_ready",
            ErrorKind::Validation => "validation",
            ErrorKind::Persistence => "persistence",
        }
    }
}

/// Reconcile pass error
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("inventory: {0}")]
    Inventory(#[from] InventoryError),

    /// Plan spec cannot be turned into a runnable plan
    #[error("plan build: {0}")]
    Build(String),

    #[error("snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    /// Execution context could not be assembled
    #[error("context: {0}")]
    Context(String),
}

impl ReconcileError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Inventory(e) if e.is_not_ready() => ErrorKind::NotReady,
            ReconcileError::Build(_) => ErrorKind::Validation,
            _ => ErrorKind::Persistence,
        }
    }
}
