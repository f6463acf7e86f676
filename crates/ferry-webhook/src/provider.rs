//! Provider admission rules

use ferry_api::{AdmissionRequest, AdmissionResponse, Admitter, Operation, Provider, ProviderType};
use regex::Regex;
use std::sync::OnceLock;

const DNS1123_LABEL: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";
const DNS1123_MAX: usize = 63;

fn dns1123() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DNS1123_LABEL).unwrap_or_else(|_| unreachable!()))
}

/// Check a DNS-1123 label
#[must_use]
pub fn is_dns1123_label(value: &str) -> bool {
    value.len() <= DNS1123_MAX && dns1123().is_match(value)
}

/// Admits Provider create and update requests
#[derive(Debug, Default, Clone, Copy)]
pub struct ProviderAdmitter;

impl ProviderAdmitter {
    /// Create new admitter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Return the first rule the provider breaks
    fn violation(provider: &Provider) -> Option<String> {
        if !is_dns1123_label(&provider.meta.name) {
            return Some(format!(
                "provider name '{}' is not a valid DNS-1123 label",
                provider.meta.name
            ));
        }
        if provider.spec.provider_type == ProviderType::OpenShift {
            return None;
        }
        if !provider.spec.url.starts_with("https://") {
            return Some(format!(
                "{} provider URL must use https: '{}'",
                provider.spec.provider_type, provider.spec.url
            ));
        }
        if provider.spec.secret.is_none() {
            return Some(format!(
                "{} provider requires a secret",
                provider.spec.provider_type
            ));
        }
        None
    }
}

impl Admitter for ProviderAdmitter {
    fn admit(&self, request: &AdmissionRequest) -> AdmissionResponse {
        if request.operation == Operation::Delete {
            return AdmissionResponse::allow(request);
        }
        if request.kind != "Provider" {
            return AdmissionResponse::deny(
                request,
                format!("unexpected kind '{}'", request.kind),
            );
        }

        let provider: Provider = match serde_json::from_value(request.object.clone()) {
            Ok(provider) => provider,
            Err(e) => return AdmissionResponse::deny(request, format!("malformed provider: {e}")),
        };

        match Self::violation(&provider) {
            Some(message) => {
                tracing::debug!(provider = %provider.meta.key(), %message, "provider denied");
                AdmissionResponse::deny(request, message)
            }
            None => AdmissionResponse::allow(request),
        }
    }
}
