//! Build identity endpoint (`ping.json`).
//!
//! Reports build date, commit id, version number and build tag, each read from
//! an environment variable named in configuration. Build date and commit id are
//! mandatory: a lookup missing either binding cannot be constructed, and a
//! response where either resolves empty is flagged incomplete (501).

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

use crate::config::PingConfig;
use crate::error::SetupError;

pub const BUILD_DATE: &str = "build_date";
pub const COMMIT_ID: &str = "commit_id";
pub const VERSION_NUMBER: &str = "version_number";
pub const BUILD_TAG: &str = "build_tag";

/// Read-only key/value source for build metadata.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Field name to environment variable bindings, in report order.
#[derive(Debug, Clone)]
pub struct PingJson {
    bindings: Vec<(&'static str, String)>,
}

impl PingJson {
    /// Fails when either mandatory binding is missing or blank.
    pub fn new(config: &PingConfig) -> Result<Self, SetupError> {
        fn bound(key: &Option<String>) -> Option<&String> {
            key.as_ref().filter(|k| !k.is_empty())
        }

        let build_date = bound(&config.build_date_key)
            .ok_or(SetupError::MissingPingKey("build_date_key"))?;
        let commit_id =
            bound(&config.commit_id_key).ok_or(SetupError::MissingPingKey("commit_id_key"))?;

        let mut bindings = vec![
            (BUILD_DATE, build_date.clone()),
            (COMMIT_ID, commit_id.clone()),
        ];
        if let Some(key) = bound(&config.version_number_key) {
            bindings.push((VERSION_NUMBER, key.clone()));
        }
        if let Some(key) = bound(&config.build_tag_key) {
            bindings.push((BUILD_TAG, key.clone()));
        }

        Ok(Self { bindings })
    }

    /// Resolves every bound field from `env`. Unbound fields are left out.
    pub fn lookup(&self, env: &dyn EnvSource) -> PingResponse {
        let mut body = Map::new();
        for (field, key) in &self.bindings {
            let value = env.var(key).map(Value::String).unwrap_or(Value::Null);
            body.insert(field.to_string(), value);
        }

        let present = |field: &str| {
            body.get(field)
                .and_then(Value::as_str)
                .is_some_and(|v| !v.is_empty())
        };
        let complete = present(BUILD_DATE) && present(COMMIT_ID);
        if !complete {
            tracing::debug!("Build identity incomplete: build_date or commit_id unset");
        }

        PingResponse { body, complete }
    }
}

/// Identity report plus whether both mandatory fields resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PingResponse {
    body: Map<String, Value>,
    complete: bool,
}

impl PingResponse {
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// 200 when complete, 501 otherwise.
    pub fn status_code(&self) -> StatusCode {
        if self.complete {
            StatusCode::OK
        } else {
            StatusCode::NOT_IMPLEMENTED
        }
    }
}

impl IntoResponse for PingResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(Value::Object(self.body))).into_response()
    }
}
