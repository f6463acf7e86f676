use ferry_api::{AdmissionRequest, ObjectKey, ObjectMeta, Operation, Provider, ProviderType};
use ferry_webhook::{routes, AdmissionReview, ProviderAdmitter};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn review(provider: &Provider) -> AdmissionReview {
    AdmissionReview {
        request: Some(AdmissionRequest {
            uid: "7f0c".to_string(),
            kind: "Provider".to_string(),
            operation: Operation::Create,
            object: serde_json::to_value(provider).unwrap(),
            old_object: None,
        }),
        response: None,
    }
}

fn ovirt(url: &str) -> Provider {
    let mut provider = Provider::new(ObjectMeta::new("ferry", "engine"), ProviderType::OVirt, url);
    provider.spec.secret = Some(ObjectKey::new("ferry", "engine-creds"));
    provider
}

#[tokio::test]
async fn allows_valid_provider() {
    let api = routes(Arc::new(ProviderAdmitter::new()));
    let res = warp::test::request()
        .method("POST")
        .path("/provider-create")
        .json(&review(&ovirt("https://engine/ovirt-engine/api")))
        .reply(&api)
        .await;

    assert_eq!(res.status(), 200);
    let answered: AdmissionReview = serde_json::from_slice(res.body()).unwrap();
    let response = answered.response.unwrap();
    assert!(response.allowed);
    assert_eq!(response.uid, "7f0c");
}

#[tokio::test]
async fn denies_invalid_provider() {
    let api = routes(Arc::new(ProviderAdmitter::new()));
    let res = warp::test::request()
        .method("POST")
        .path("/provider-create")
        .json(&review(&ovirt("http://engine")))
        .reply(&api)
        .await;

    let answered: AdmissionReview = serde_json::from_slice(res.body()).unwrap();
    let response = answered.response.unwrap();
    assert!(!response.allowed);
    assert!(response.message.is_some());
}

#[tokio::test]
async fn review_without_request_is_denied() {
    let api = routes(Arc::new(ProviderAdmitter::new()));
    let res = warp::test::request()
        .method("POST")
        .path("/provider-create")
        .json(&AdmissionReview::default())
        .reply(&api)
        .await;

    let answered: AdmissionReview = serde_json::from_slice(res.body()).unwrap();
    assert!(!answered.response.unwrap().allowed);
}

#[tokio::test]
async fn other_paths_rejected() {
    let api = routes(Arc::new(ProviderAdmitter::new()));
    let res = warp::test::request()
        .method("GET")
        .path("/provider-create")
        .reply(&api)
        .await;
    assert_eq!(res.status(), 405);
}
