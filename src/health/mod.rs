//! Health probes and their registry.
//!
//! A probe is any zero-argument check. The [`Registry`] collects probes,
//! loads defaults and extension-contributed probes lazily, and runs them with
//! per-probe isolation. [`Report`] folds the results into the JSON body served
//! on the health endpoint.
//!
//! ```no_run
//! use healthz::health::{probe_fn, Catalog, ProbeError, Registry, Report};
//!
//! async fn cache_reachable() -> Result<bool, ProbeError> {
//!     Ok(true)
//! }
//!
//! # async fn demo() {
//! let mut registry = Registry::new(Catalog::new()).with_defaults(Vec::<String>::new());
//! registry.register(probe_fn(cache_reachable));
//! let report = Report::from_results(registry.run().await);
//! assert!(report.is_healthy());
//! # }
//! ```

pub mod database;
pub mod probe;
pub mod registry;
pub mod report;
pub mod result;
pub mod url;

pub use database::{Connector, DatabaseProbe, TcpConnector, DATABASE_PROBE_NAME};
pub use probe::{probe_fn, structural_name, FnProbe, Probe, ProbeError};
pub use registry::{Catalog, Extension, Registry, RunMode, DEFAULT_PROBES};
pub use report::{Report, AGGREGATE_KEY};
pub use result::{Outcome, ProbeResult};
pub use url::{resolve_path, Credential, JsonUrlProbe, UrlProbe};
