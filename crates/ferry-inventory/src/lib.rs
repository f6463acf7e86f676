//! Ferry Inventory - read-through access to provider inventory
//!
//! - [`RestClient`]: connect-once JSON client with `list`/`get` and a
//!   distinct not-found signal
//! - [`Inventory`]: the lookups the plan validator needs
//! - [`WebInventory`]: [`Inventory`] over the inventory web service

#![allow(missing_docs)]

pub mod client;
pub mod error;
pub mod inventory;
pub mod model;

pub use client::{ClientConfig, RestClient};
pub use error::InventoryError;
pub use inventory::{Inventory, WebInventory};
pub use model::{Datastore, Network, Vm};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
