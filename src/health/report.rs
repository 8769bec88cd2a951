//! Aggregation of probe results into the health report.
//!
//! The report is a JSON object keyed by probe name, each value holding the
//! probe's `status` plus its extras flattened alongside. The reserved `*` key
//! carries the aggregate status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

use super::result::ProbeResult;

/// Report key holding the aggregate status.
pub const AGGREGATE_KEY: &str = "*";

/// Keyed summary of one registry run.
///
/// Two probes with the same name share a key: the later result replaces the
/// earlier one. The aggregate covers only the entries left in the body, so a
/// replaced result no longer counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    checks: Map<String, Value>,
    healthy: bool,
}

impl Report {
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = ProbeResult>,
    {
        let mut checks = Map::new();

        for result in results {
            let mut entry = Map::new();
            entry.insert("status".to_string(), Value::Bool(result.status()));
            for (key, value) in result.extras() {
                if key == "status" || key == "name" {
                    tracing::debug!(probe = %result.name(), key = %key, "Ignoring reserved extra");
                    continue;
                }
                entry.insert(key.clone(), value.clone());
            }
            checks.insert(result.name().to_string(), Value::Object(entry));
        }

        let healthy = checks
            .values()
            .all(|entry| entry.get("status").and_then(Value::as_bool).unwrap_or(false));

        Self { checks, healthy }
    }

    /// True when every probe passed (vacuously true for an empty run).
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// 200 when healthy, 500 otherwise.
    pub fn status_code(&self) -> StatusCode {
        if self.healthy {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Entry for a single probe, if present.
    pub fn check(&self, name: &str) -> Option<&Value> {
        self.checks.get(name)
    }

    /// Full report body, aggregate last.
    pub fn to_json(&self) -> Value {
        let mut body = self.checks.clone();
        let mut aggregate = Map::new();
        aggregate.insert("status".to_string(), Value::Bool(self.healthy));
        body.insert(AGGREGATE_KEY.to_string(), Value::Object(aggregate));
        Value::Object(body)
    }
}

impl IntoResponse for Report {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_passing() {
        let report = Report::from_results(vec![
            ProbeResult::passed("database"),
            ProbeResult::passed("cache"),
        ]);
        assert!(report.is_healthy());
        assert_eq!(report.status_code(), StatusCode::OK);
        assert_eq!(
            report.to_json(),
            json!({
                "database": {"status": true},
                "cache": {"status": true},
                "*": {"status": true}
            })
        );
    }

    #[test]
    fn test_one_failure_fails_aggregate() {
        let report = Report::from_results(vec![
            ProbeResult::passed("database"),
            ProbeResult::failed("upstream")
                .with_extra("error", "Timed out")
                .with_extra("url", "http://example.com/"),
        ]);
        assert!(!report.is_healthy());
        assert_eq!(report.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            report.check("upstream"),
            Some(&json!({"status": false, "error": "Timed out", "url": "http://example.com/"}))
        );
        assert_eq!(report.check("database"), Some(&json!({"status": true})));
    }

    #[test]
    fn test_empty_run_is_healthy() {
        let report = Report::from_results(Vec::new());
        assert!(report.is_healthy());
        assert_eq!(report.to_json(), json!({"*": {"status": true}}));
    }

    #[test]
    fn test_duplicate_names_overwrite_and_aggregate_what_remains() {
        let report = Report::from_results(vec![
            ProbeResult::failed("dup"),
            ProbeResult::passed("dup").with_extra("second", true),
        ]);
        assert_eq!(report.check("dup"), Some(&json!({"status": true, "second": true})));
        assert!(report.is_healthy());
        assert_eq!(report.status_code(), StatusCode::OK);
        assert_eq!(
            report.to_json(),
            json!({"dup": {"status": true, "second": true}, "*": {"status": true}})
        );
    }

    #[test]
    fn test_duplicate_name_failing_last_fails_aggregate() {
        let report = Report::from_results(vec![
            ProbeResult::passed("dup"),
            ProbeResult::failed("dup"),
        ]);
        assert!(!report.is_healthy());
        assert_eq!(report.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_reserved_extras_are_ignored() {
        let report = Report::from_results(vec![ProbeResult::failed("liar")
            .with_extra("status", true)
            .with_extra("name", "other")]);
        assert_eq!(report.check("liar"), Some(&json!({"status": false})));
    }

    #[test]
    fn test_keys_keep_registration_order() {
        let report = Report::from_results(vec![
            ProbeResult::passed("zeta"),
            ProbeResult::passed("alpha"),
        ]);
        let body = report.to_json();
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "*"]);
    }
}
