//! Ferry Webhook - admission for dependency objects
//!
//! Providers are checked before they are persisted. The same
//! [`ProviderAdmitter`] backs the HTTP endpoint and the in-process store gate.

#![allow(missing_docs)]

pub mod provider;
pub mod server;

pub use provider::ProviderAdmitter;
pub use server::{routes, serve, AdmissionReview};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
