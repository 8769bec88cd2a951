//! The probe capability and its adapters.
//!
//! Anything that can be checked with no arguments is a probe. Plain async
//! functions are adapted with [`probe_fn`]; types implement [`Probe`] directly
//! and can be registered either as an instance or by type (constructed through
//! `Default` on every run).

use std::any::Any;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use super::result::Outcome;

/// Reported as `exception_class` when a probe panics.
pub const PANIC_KIND: &str = "panic";

/// Failure raised by a probe body.
///
/// Any `std::error::Error` converts into a `ProbeError` through `?`, keeping the
/// short name of the source error type as its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    kind: String,
    message: String,
}

impl ProbeError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates an error from a bare message, with kind `ProbeError`.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("ProbeError", message)
    }

    /// Converts a caught panic payload into an error.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "probe panicked".to_string()
        };
        Self::new(PANIC_KIND, message)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl<E> From<E> for ProbeError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(structural_name(std::any::type_name::<E>()), err.to_string())
    }
}

/// Last path segment of a Rust type name, generic parameters stripped.
///
/// `healthz::health::database::DatabaseProbe<healthz::health::database::TcpConnector>`
/// becomes `DatabaseProbe`.
pub fn structural_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// A zero-argument check contributing to the aggregate health report.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Name under which the result is reported. Defaults to the type's identifier.
    fn name(&self) -> String {
        structural_name(std::any::type_name::<Self>())
    }

    /// Runs the check.
    async fn check(&self) -> Result<Outcome, ProbeError>;
}

/// Adapter turning an async function into a [`Probe`].
pub struct FnProbe<F> {
    name: String,
    func: F,
}

/// Wraps an async function as a probe named after the function itself.
///
/// ```ignore
/// async fn cache_reachable() -> Result<bool, ProbeError> { Ok(true) }
/// registry.register(probe_fn(cache_reachable));
/// ```
pub fn probe_fn<F>(func: F) -> FnProbe<F> {
    FnProbe {
        name: structural_name(std::any::type_name::<F>()),
        func,
    }
}

impl<F> FnProbe<F> {
    /// Overrides the reported name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<F, Fut, O> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ProbeError>> + Send + 'static,
    O: Into<Outcome> + Send + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn check(&self) -> Result<Outcome, ProbeError> {
        (self.func)().await.map(Into::into)
    }
}
