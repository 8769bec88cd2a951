//! Request span middleware for correlating logs with requests.
//!
//! Generates a UUID v4 for each incoming request and opens a tracing span
//! around it, so probe logs emitted while serving a health request carry the
//! same `request_id`.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Request ID, available to handlers through request extensions.
#[derive(Clone, Copy, Debug)]
pub struct RequestId(pub Uuid);

/// Wraps the request in a span carrying its id, method and path.
///
/// Install as the outermost layer so the span covers every other layer.
pub async fn request_span_layer(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        duration_ms = tracing::field::Empty,
    );
    request.extensions_mut().insert(RequestId(request_id));

    let start = Instant::now();
    async move {
        let response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::info!(status = response.status().as_u16(), "Request completed");
        response
    }
    .instrument(span)
    .await
}
