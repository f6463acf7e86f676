//! Ferry API - object model for plan reconciliation
//!
//! Defines the persisted objects the controller reads and writes:
//! - **Plan**: migration policy (providers, field map, VM list) and its status
//! - **Migration**: one request to execute a plan, with its input snapshot
//! - **Provider** / **Host**: dependency objects reconciled elsewhere
//! - **Conditions**: staged status conditions with blocker detection
//! - **Admission**: the accept/reject contract applied before persistence
//!
//! # Example
//!
//! ```rust
//! use ferry_api::{Category, Condition, Conditions, ConditionStatus};
//!
//! let mut conditions = Conditions::default();
//! conditions.begin_staging();
//! conditions.set_condition(Condition::new(
//!     "Ready",
//!     ConditionStatus::True,
//!     Category::Required,
//!     "The migration plan is ready.",
//! ));
//! let diff = conditions.end_staging();
//!
//! assert_eq!(diff.added.len(), 1);
//! assert!(!conditions.has_blocker_condition());
//! ```

#![allow(missing_docs)]

pub mod admission;
pub mod condition;
pub mod host;
pub mod meta;
pub mod migration;
pub mod plan;
pub mod provider;
pub mod snapshot;

// Re-exports for convenience
pub use admission::{AdmissionRequest, AdmissionResponse, Admitter, Operation};
pub use condition::{Category, Condition, ConditionDiff, ConditionStatus, Conditions};
pub use host::{Host, HostSpec, HostStatus};
pub use meta::{Generational, ObjectKey, ObjectKeyError, ObjectMeta, Resource, Uid};
pub use migration::{Migration, MigrationSpec, MigrationStatus};
pub use plan::{
    NetworkPair, Plan, PlanMap, PlanMigrationStatus, PlanSpec, PlanStatus, ProviderPair,
    Referenced, ReferencedProviders, StoragePair, VmRef,
};
pub use provider::{Provider, ProviderSpec, ProviderStatus, ProviderType};
pub use snapshot::{Snapshot, SnapshotError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Ferry objects
    pub use crate::{
        Category, Condition, ConditionStatus, Conditions, Generational, Host, Migration,
        ObjectKey, ObjectMeta, Plan, Provider, ProviderType, Resource, Snapshot, Uid,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
