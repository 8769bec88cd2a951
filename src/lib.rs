//! healthz - pluggable health-check registry and build identity endpoint.
//!
//! Probes (database reachability, upstream URL checks, custom async functions
//! or types) are registered with a [`health::Registry`], run in isolation, and
//! folded into one JSON report with an aggregate pass/fail. A separate
//! [`ping`] lookup reports build provenance from environment variables.

pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod ping;
pub mod routes;
pub mod shutdown;
pub mod state;

pub use error::*;
