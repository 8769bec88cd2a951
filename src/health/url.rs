//! Probes that load a URL and assert on the response.
//!
//! Checks run in a fixed order and only when configured: status code, then
//! body substring, then the value found at a dotted JSON path. Transport
//! failures are reported by the probe itself ("Timed out" / "URL not loaded")
//! rather than escaping to the registry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Method};
use serde_json::Value;

use super::probe::{Probe, ProbeError};
use super::result::{Outcome, ProbeResult};

/// Default request timeout.
pub const DEFAULT_URL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default expected status code.
pub const DEFAULT_STATUS_CODE: u16 = 200;

pub const TIMED_OUT: &str = "Timed out";
pub const URL_NOT_LOADED: &str = "URL not loaded";
pub const JSON_NOT_PARSEABLE: &str = "JSON response cannot be parsed";

/// Credentials attached to the probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer(String),
}

/// Loads a URL and checks the response.
#[derive(Debug, Clone)]
pub struct UrlProbe {
    name: String,
    url: String,
    method: Method,
    body: Option<String>,
    headers: Vec<(String, String)>,
    credential: Option<Credential>,
    status_code: Option<u16>,
    timeout: Duration,
    allow_redirects: bool,
    text_in_response: Option<String>,
    value_at_json_path: Option<(Value, String)>,
}

/// Result of running the request and assertions, before it is turned into a report entry.
enum Evaluation {
    /// All configured checks passed; carries the response body.
    Passed(String),
    Failed(String),
}

impl UrlProbe {
    /// Creates a GET probe expecting a 200 within five seconds, not following redirects.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            credential: None,
            status_code: Some(DEFAULT_STATUS_CODE),
            timeout: DEFAULT_URL_TIMEOUT,
            allow_redirects: false,
            text_in_response: None,
            value_at_json_path: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Expected status code; `None` skips the check.
    pub fn status_code(mut self, status_code: Option<u16>) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }

    /// Text that must appear in the response body.
    pub fn text_in_response(mut self, text: impl Into<String>) -> Self {
        self.text_in_response = Some(text.into());
        self
    }

    /// Value expected at a dot-separated path into the JSON body, e.g. `results.0.test`.
    pub fn value_at_json_path(mut self, expected: impl Into<Value>, path: impl Into<String>) -> Self {
        self.value_at_json_path = Some((expected.into(), path.into()));
        self
    }

    /// Turns this probe into one that also reports the parsed response body.
    pub fn include_response(self) -> JsonUrlProbe {
        JsonUrlProbe { inner: self }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&self) -> Result<reqwest::Client, ProbeError> {
        let policy = if self.allow_redirects {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .redirect(policy)
            .timeout(self.timeout)
            .build()?;
        Ok(client)
    }

    fn request(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut request = client.request(self.method.clone(), &self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }
        match &self.credential {
            Some(Credential::Basic { username, password }) => {
                request = request.basic_auth(username, password.as_ref())
            }
            Some(Credential::Bearer(token)) => request = request.bearer_auth(token),
            None => {}
        }
        request
    }

    async fn evaluate(&self) -> Result<Evaluation, ProbeError> {
        let client = self.client()?;
        let response = match self.request(&client).send().await {
            Ok(response) => response,
            Err(err) => return self.transport_failure(err),
        };

        if let Some(expected) = self.status_code {
            if response.status().as_u16() != expected {
                return Ok(Evaluation::Failed(format!(
                    "Response status was not {}",
                    expected
                )));
            }
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => return self.transport_failure(err),
        };

        if let Some(needle) = &self.text_in_response {
            if !text.contains(needle.as_str()) {
                return Ok(Evaluation::Failed(format!(
                    "Response text did not contain {}",
                    needle
                )));
            }
        }

        if let Some((expected, path)) = &self.value_at_json_path {
            let segments: Vec<&str> = path.split('.').collect();
            let found = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| resolve_path(&body, &segments).cloned());
            match found {
                None => {
                    return Ok(Evaluation::Failed(format!(
                        "Response JSON path \"{}\" does not exist",
                        path
                    )))
                }
                Some(value) if !json_eq(&value, expected) => {
                    return Ok(Evaluation::Failed(format!(
                        "Response JSON path \"{}\" did not contain \"{}\"",
                        path,
                        display_value(expected)
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(Evaluation::Passed(text))
    }

    /// Maps a reqwest failure to the probe's own diagnostic.
    ///
    /// Builder errors mean the probe itself is misconfigured (bad header name,
    /// malformed URL) and surface as execution errors instead.
    fn transport_failure(&self, err: reqwest::Error) -> Result<Evaluation, ProbeError> {
        if err.is_builder() {
            return Err(err.into());
        }
        let message = if err.is_timeout() {
            TIMED_OUT
        } else {
            URL_NOT_LOADED
        };
        tracing::debug!(probe = %self.name, url = %self.url, error = %err, "URL probe transport failure");
        Ok(Evaluation::Failed(message.to_string()))
    }

    fn error_result(&self, error: String) -> ProbeResult {
        ProbeResult::failed(self.name.clone())
            .with_extra("error", error)
            .with_extra("url", self.url.clone())
    }

    fn success_result(&self) -> ProbeResult {
        ProbeResult::passed(self.name.clone()).with_extra("url", self.url.clone())
    }
}

#[async_trait]
impl Probe for UrlProbe {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn check(&self) -> Result<Outcome, ProbeError> {
        let result = match self.evaluate().await? {
            Evaluation::Passed(_) => self.success_result(),
            Evaluation::Failed(error) => self.error_result(error),
        };
        Ok(result.into())
    }
}

/// A [`UrlProbe`] that reports the parsed JSON body under `response` when it passes.
#[derive(Debug, Clone)]
pub struct JsonUrlProbe {
    inner: UrlProbe,
}

impl JsonUrlProbe {
    pub fn new(probe: UrlProbe) -> Self {
        Self { inner: probe }
    }

    pub fn url(&self) -> &str {
        self.inner.url()
    }
}

#[async_trait]
impl Probe for JsonUrlProbe {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    async fn check(&self) -> Result<Outcome, ProbeError> {
        let result = match self.inner.evaluate().await? {
            Evaluation::Passed(text) => {
                let response = serde_json::from_str::<Value>(&text)
                    .unwrap_or_else(|_| Value::String(JSON_NOT_PARSEABLE.to_string()));
                self.inner.success_result().with_extra("response", response)
            }
            Evaluation::Failed(error) => self.inner.error_result(error),
        };
        Ok(result.into())
    }
}

/// Descends into `value` one segment at a time.
///
/// Arrays take integer segments (negative counts from the end), objects take
/// keys. Anything else, or a missing key or index, resolves to `None`.
pub fn resolve_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let Some((head, rest)) = path.split_first() else {
        return Some(value);
    };
    let next = match value {
        Value::Array(items) => {
            let index: i64 = head.parse().ok()?;
            let index = if index < 0 {
                items.len() as i64 + index
            } else {
                index
            };
            items.get(usize::try_from(index).ok()?)?
        }
        Value::Object(map) => map.get(*head)?,
        _ => return None,
    };
    resolve_path(next, rest)
}

/// Structural equality where numbers compare by value, so `123 == 123.0`.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_eq(x, y)))
        }
        _ => a == b,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_path_through_arrays_and_objects() {
        let body = json!({"results": [{"test": 123}]});
        assert_eq!(resolve_path(&body, &["results", "0", "test"]), Some(&json!(123)));
        assert_eq!(resolve_path(&body, &[]), Some(&body));
    }

    #[test]
    fn test_resolve_path_negative_index() {
        let body = json!({"items": [1, 2, 3]});
        assert_eq!(resolve_path(&body, &["items", "-1"]), Some(&json!(3)));
        assert_eq!(resolve_path(&body, &["items", "-4"]), None);
    }

    #[test]
    fn test_resolve_path_failures() {
        let body = json!({"results": [{"test": 123}], "name": "svc"});
        assert_eq!(resolve_path(&body, &["missing"]), None);
        assert_eq!(resolve_path(&body, &["results", "1"]), None);
        assert_eq!(resolve_path(&body, &["results", "first"]), None);
        assert_eq!(resolve_path(&body, &["name", "inner"]), None);
    }

    #[test]
    fn test_json_eq_compares_numbers_by_value() {
        assert!(json_eq(&json!(123), &json!(123.0)));
        assert!(!json_eq(&json!(123), &json!(999)));
        assert!(json_eq(&json!({"a": [1, 2.0]}), &json!({"a": [1.0, 2]})));
        assert!(!json_eq(&json!("123"), &json!(123)));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("ok")), "ok");
        assert_eq!(display_value(&json!(999)), "999");
    }

    #[test]
    fn test_defaults() {
        let probe = UrlProbe::new("url", "http://www.example.com/");
        assert_eq!(probe.method, Method::GET);
        assert_eq!(probe.status_code, Some(200));
        assert_eq!(probe.timeout, DEFAULT_URL_TIMEOUT);
        assert!(!probe.allow_redirects);
        assert_eq!(Probe::name(&probe), "url");
    }

    #[test]
    fn test_error_and_success_results() {
        let probe = UrlProbe::new("url", "http://www.example.com/");
        let failed = probe.error_result(TIMED_OUT.to_string());
        assert!(!failed.status());
        assert_eq!(failed.extra("error"), Some(&json!("Timed out")));
        assert_eq!(failed.extra("url"), Some(&json!("http://www.example.com/")));

        let passed = probe.success_result();
        assert!(passed.status());
        assert_eq!(passed.extras().len(), 1);
    }
}
