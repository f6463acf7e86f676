//! Admission contract
//!
//! Objects pass a synchronous accept/reject gate before they are persisted.
//! The request carries the object as JSON so one gate can serve any kind.

use serde::{Deserialize, Serialize};

/// Operation under admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Admission request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    #[serde(default)]
    pub uid: String,
    pub kind: String,
    pub operation: Operation,
    #[serde(default)]
    pub object: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<serde_json::Value>,
}

/// Admission verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    #[serde(default)]
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AdmissionResponse {
    /// Accept the request
    #[inline]
    #[must_use]
    pub fn allow(request: &AdmissionRequest) -> Self {
        Self {
            uid: request.uid.clone(),
            allowed: true,
            message: None,
        }
    }

    /// Reject the request
    #[inline]
    #[must_use]
    pub fn deny(request: &AdmissionRequest, message: impl Into<String>) -> Self {
        Self {
            uid: request.uid.clone(),
            allowed: false,
            message: Some(message.into()),
        }
    }
}

/// Synchronous admission gate
pub trait Admitter: Send + Sync {
    /// Decide whether the request may be persisted
    fn admit(&self, request: &AdmissionRequest) -> AdmissionResponse;
}
