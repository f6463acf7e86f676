//! Ferry Controller - plan reconciliation
//!
//! Level-triggered control loop for migration plans:
//! - Holds plans while dependencies are unreconciled ([`DependencyGate`])
//! - Stages blocker conditions from the plan spec ([`PlanValidator`])
//! - Selects the oldest pending migration ([`pending_migrations`])
//! - Snapshots plan inputs and drives the engine ([`Dispatcher`])
//! - Turns every pass into a requeue decision ([`Reconciler`])
//!
//! # Example
//!
//! ```rust,ignore
//! use ferry_controller::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryStore::new());
//! let engine = Arc::new(SimulatedEngine::new(store.clone(), std::time::Duration::from_secs(1)));
//! let reconciler = Reconciler::new(
//!     store.clone(),
//!     None,
//!     engine,
//!     Arc::new(TracingRecorder),
//!     Settings::new(),
//! );
//!
//! let action = reconciler.reconcile(&ObjectKey::new("ferry", "plan-1")).await;
//! assert_eq!(action, Action::Done);
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod controller;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod manifest;
pub mod queue;
pub mod readiness;
pub mod reconciler;
pub mod selection;
pub mod settings;
pub mod store;
pub mod triggers;
pub mod validation;

// Re-exports for convenience
pub use controller::Controller;
pub use dispatch::Dispatcher;
pub use engine::{EngineError, ExecutionEngine, PlanContext, SimulatedEngine};
pub use error::{ErrorKind, ReconcileError};
pub use events::{Event, EventRecorder, EventType, MemoryRecorder, TracingRecorder};
pub use logging::{init_logging, LogFormat};
pub use manifest::{Manifest, ManifestError};
pub use queue::WorkQueue;
pub use readiness::DependencyGate;
pub use reconciler::{Action, Reconciler};
pub use selection::{order_pending, pending_migrations};
pub use settings::{InventorySettings, Settings, SettingsError};
pub use store::{Change, MemoryStore, ObjectStore, StoreError, Stored, WatchEvent};
pub use validation::PlanValidator;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the controller
    pub use crate::{
        Action, Controller, ExecutionEngine, MemoryRecorder, MemoryStore, ObjectStore,
        PlanContext, Reconciler, Settings, SimulatedEngine, TracingRecorder,
    };
    pub use ferry_api::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
