//! Aggregated health report endpoint.
//!
//! Runs every registered probe and answers with the keyed report: 200 when all
//! probes pass, 500 otherwise. The handler itself never fails.

use axum::extract::State;
use tracing::instrument;

use crate::health::Report;
use crate::state::AppState;

/// Health report handler.
#[instrument(name = "health::healthcheck", skip(state))]
pub async fn healthcheck(State(state): State<AppState>) -> Report {
    let registry = state.registry.read().await;
    let registry = if registry.is_loaded() {
        registry
    } else {
        drop(registry);
        let mut registry = state.registry.write().await;
        // Another request may have loaded it while we waited
        if !registry.is_loaded() {
            registry.load();
        }
        registry.downgrade()
    };
    let results = registry.run_loaded().await;
    drop(registry);
    let report = Report::from_results(results);
    tracing::info!(healthy = report.is_healthy(), "Health report built");
    report
}
