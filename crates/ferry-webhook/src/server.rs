//! Admission HTTP endpoint
//!
//! `POST /provider-create` takes an admission review carrying a `request`
//! and answers with the same document carrying a `response`.

use crate::provider::ProviderAdmitter;
use ferry_api::{AdmissionRequest, AdmissionResponse, Admitter};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

/// Admission review envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionReview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// Answer the review with an admitter
    #[must_use]
    pub fn answer(self, admitter: &dyn Admitter) -> Self {
        let response = match &self.request {
            Some(request) => admitter.admit(request),
            None => AdmissionResponse {
                uid: String::new(),
                allowed: false,
                message: Some("admission review has no request".to_string()),
            },
        };
        Self {
            request: None,
            response: Some(response),
        }
    }
}

/// Build admission routes
pub fn routes(
    admitter: Arc<dyn Admitter>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let admitter = warp::any().map(move || Arc::clone(&admitter));

    warp::post()
        .and(warp::path("provider-create"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(1024 * 1024))
        .and(warp::body::json())
        .and(admitter)
        .map(|review: AdmissionReview, admitter: Arc<dyn Admitter>| {
            let answered = review.answer(admitter.as_ref());
            if let Some(response) = &answered.response {
                tracing::info!(
                    uid = %response.uid,
                    allowed = response.allowed,
                    "provider admission"
                );
            }
            warp::reply::json(&answered)
        })
}

/// Serve provider admission until the process exits
pub async fn serve(addr: SocketAddr) {
    tracing::info!(%addr, "admission webhook listening");
    warp::serve(routes(Arc::new(ProviderAdmitter::new())))
        .run(addr)
        .await;
}
