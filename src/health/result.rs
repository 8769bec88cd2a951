//! Probe outcome types.
//!
//! A `ProbeResult` is the normalized record of one probe invocation. Probes may
//! hand one back directly, or return a plain `bool` that the registry wraps.

use std::fmt;

use serde_json::{Map, Value};

/// Outcome of a single probe invocation.
///
/// Immutable once handed to the registry: fields are private and only the
/// builder-style `with_extra` (which consumes `self`) can add detail.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    name: String,
    status: bool,
    extras: Map<String, Value>,
}

impl ProbeResult {
    /// Creates a result with no extras.
    pub fn new(name: impl Into<String>, status: bool) -> Self {
        Self {
            name: name.into(),
            status,
            extras: Map::new(),
        }
    }

    /// Creates a passing result.
    pub fn passed(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    /// Creates a failing result.
    pub fn failed(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    /// Attaches an extra key/value pair reported alongside the status.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Looks up a single extra.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.status { "Passed" } else { "Failed" };
        write!(f, "{}: {}", self.name, verdict)
    }
}

/// What a probe may return: a bare status, or a fully formed result.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Status(bool),
    Result(ProbeResult),
}

impl From<bool> for Outcome {
    fn from(status: bool) -> Self {
        Outcome::Status(status)
    }
}

impl From<ProbeResult> for Outcome {
    fn from(result: ProbeResult) -> Self {
        Outcome::Result(result)
    }
}
