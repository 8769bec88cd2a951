//! Build identity endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Identity handler: 200 when build date and commit id resolve, 501 otherwise.
pub async fn ping(State(state): State<AppState>) -> Response {
    match &state.ping {
        Some(ping) => ping.lookup(state.env.as_ref()).into_response(),
        // Only mounted when configured
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
