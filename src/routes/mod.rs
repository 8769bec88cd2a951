//! HTTP route handlers.
//!
//! `/healthcheck.json` serves the aggregated probe report and `/ping.json` the
//! build identity (mounted only when configured). Neither may be cached, and
//! the identity endpoint is readable from any origin.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of probe logs with requests.

pub mod health;
pub mod ping;

use axum::{middleware, routing::get, Router};
use http::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{CACHE_CONTROL_NO_STORE, HEALTHCHECK_PATH, PING_PATH};
use crate::middleware::request_span_layer;
use crate::state::AppState;

/// Creates the Axum router with the health and identity routes.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route(HEALTHCHECK_PATH, get(health::healthcheck));

    if state.ping.is_some() {
        let ping_routes = Router::new()
            .route(PING_PATH, get(ping::ping))
            .layer(SetResponseHeaderLayer::overriding(
                ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ));
        router = router.merge(ping_routes);
    }

    router
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
        ))
        // Request span middleware - outermost so probe logs carry the request id
        .layer(middleware::from_fn(request_span_layer))
}
