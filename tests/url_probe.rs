//! URL probe tests against local upstream servers.
//!
//! Each test starts an axum server on an ephemeral port to stand in for the
//! upstream being checked.

use std::time::Duration;

use axum::{
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use healthz::health::{Catalog, Credential, Outcome, Probe, ProbeResult, Registry, UrlProbe};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::net::TcpListener;

fn upstream() -> Router {
    Router::new()
        .route(
            "/results",
            get(|| async { (StatusCode::CREATED, Json(json!({"results": [{"test": 123}]}))) }),
        )
        .route("/text", get(|| async { "service is up and running" }))
        .route("/broken", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "degraded") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }),
        )
        .route("/moved", get(|| async { Redirect::temporary("/results") }))
        .route(
            "/auth",
            get(|headers: HeaderMap| async move {
                headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("anonymous")
                    .to_string()
            }),
        )
        .route("/echo", post(|body: String| async move { body }))
}

async fn serve() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream()).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn check(probe: &dyn Probe) -> ProbeResult {
    match probe.check().await.unwrap() {
        Outcome::Result(result) => result,
        Outcome::Status(status) => panic!("URL probes return full results, got {}", status),
    }
}

#[tokio::test]
async fn test_status_and_json_path_match() {
    let url = format!("{}/results", serve().await);
    let probe = UrlProbe::new("url", url.clone())
        .status_code(Some(201))
        .value_at_json_path(123, "results.0.test");

    let result = check(&probe).await;
    assert!(result.status());
    assert_eq!(result.name(), "url");
    assert_eq!(result.extra("url"), Some(&json!(url)));
    assert!(result.extra("error").is_none());
}

#[tokio::test]
async fn test_json_path_value_mismatch() {
    let url = format!("{}/results", serve().await);
    let probe = UrlProbe::new("url", url.clone())
        .status_code(Some(201))
        .value_at_json_path(999, "results.0.test");

    let result = check(&probe).await;
    assert!(!result.status());
    assert_eq!(
        result.extra("error"),
        Some(&json!("Response JSON path \"results.0.test\" did not contain \"999\""))
    );
    assert_eq!(result.extra("url"), Some(&json!(url)));
}

#[tokio::test]
async fn test_json_path_missing() {
    let url = format!("{}/results", serve().await);
    let probe = UrlProbe::new("url", url)
        .status_code(Some(201))
        .value_at_json_path(123, "results.1.test");

    let result = check(&probe).await;
    assert!(!result.status());
    assert_eq!(
        result.extra("error"),
        Some(&json!("Response JSON path \"results.1.test\" does not exist"))
    );
}

#[tokio::test]
async fn test_json_path_on_non_json_body() {
    let url = format!("{}/text", serve().await);
    let probe = UrlProbe::new("url", url).value_at_json_path("up", "status");

    let result = check(&probe).await;
    assert_eq!(
        result.extra("error"),
        Some(&json!("Response JSON path \"status\" does not exist"))
    );
}

#[tokio::test]
async fn test_unexpected_status() {
    let url = format!("{}/results", serve().await);
    let probe = UrlProbe::new("url", url);

    let result = check(&probe).await;
    assert!(!result.status());
    assert_eq!(result.extra("error"), Some(&json!("Response status was not 200")));
}

#[tokio::test]
async fn test_status_check_can_be_skipped() {
    let url = format!("{}/broken", serve().await);
    let probe = UrlProbe::new("url", url)
        .status_code(None)
        .text_in_response("degraded");

    assert!(check(&probe).await.status());
}

#[tokio::test]
async fn test_text_in_response() {
    let url = format!("{}/text", serve().await);

    let present = UrlProbe::new("url", url.clone()).text_in_response("up and running");
    assert!(check(&present).await.status());

    let absent = UrlProbe::new("url", url).text_in_response("maintenance");
    let result = check(&absent).await;
    assert!(!result.status());
    assert_eq!(
        result.extra("error"),
        Some(&json!("Response text did not contain maintenance"))
    );
}

#[tokio::test]
async fn test_timeout() {
    let url = format!("{}/slow", serve().await);
    let probe = UrlProbe::new("url", url).timeout(Duration::from_millis(200));

    let result = check(&probe).await;
    assert!(!result.status());
    assert_eq!(result.extra("error"), Some(&json!("Timed out")));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let probe = UrlProbe::new("url", format!("http://{}/", addr));
    let result = check(&probe).await;
    assert!(!result.status());
    assert_eq!(result.extra("error"), Some(&json!("URL not loaded")));
}

#[tokio::test]
async fn test_redirects_not_followed_by_default() {
    let url = format!("{}/moved", serve().await);

    let strict = UrlProbe::new("url", url.clone()).status_code(Some(201));
    let result = check(&strict).await;
    assert_eq!(result.extra("error"), Some(&json!("Response status was not 201")));

    let following = UrlProbe::new("url", url)
        .status_code(Some(201))
        .allow_redirects(true);
    assert!(check(&following).await.status());
}

#[tokio::test]
async fn test_bearer_credential_is_sent() {
    let url = format!("{}/auth", serve().await);
    let probe = UrlProbe::new("url", url)
        .credential(Credential::Bearer("token123".to_string()))
        .text_in_response("Bearer token123");

    assert!(check(&probe).await.status());
}

#[tokio::test]
async fn test_post_body_is_sent() {
    let url = format!("{}/echo", serve().await);
    let probe = UrlProbe::new("url", url)
        .method(Method::POST)
        .header("content-type", "text/plain")
        .body("ping-payload")
        .text_in_response("ping-payload");

    assert!(check(&probe).await.status());
}

#[tokio::test]
async fn test_json_url_probe_includes_response() {
    let url = format!("{}/results", serve().await);
    let probe = UrlProbe::new("url", url.clone())
        .status_code(Some(201))
        .value_at_json_path(123, "results.0.test")
        .include_response();

    let result = check(&probe).await;
    assert!(result.status());
    assert_eq!(result.extra("url"), Some(&json!(url)));
    assert_eq!(
        result.extra("response"),
        Some(&json!({"results": [{"test": 123}]}))
    );
}

#[tokio::test]
async fn test_json_url_probe_unparseable_body() {
    let url = format!("{}/text", serve().await);
    let probe = UrlProbe::new("url", url).include_response();

    let result = check(&probe).await;
    assert!(result.status());
    assert_eq!(
        result.extra("response"),
        Some(&Value::String("JSON response cannot be parsed".to_string()))
    );
}

#[tokio::test]
async fn test_json_url_probe_failure_has_no_response() {
    let url = format!("{}/results", serve().await);
    let probe = UrlProbe::new("url", url).include_response();

    let result = check(&probe).await;
    assert!(!result.status());
    assert!(result.extra("response").is_none());
}

#[tokio::test]
async fn test_misconfigured_probe_surfaces_as_execution_error() {
    let url = format!("{}/text", serve().await);
    let probe = UrlProbe::new("url", url).header("bad header", "value");

    let mut registry = Registry::new(Catalog::new()).with_defaults(Vec::<String>::new());
    registry.register(probe);
    let results = registry.run().await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].status());
    assert_eq!(results[0].extra("exception_class"), Some(&json!("Error")));
    assert!(results[0].extra("exception").is_some());
}
