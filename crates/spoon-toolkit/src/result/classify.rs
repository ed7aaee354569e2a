//! Turning a raw provider response into a [`ToolResult`].
//!
//! Transport status alone is not enough: several providers answer HTTP 200
//! with an error code in the body (`{"code": 4001, "message": "..."}`) or a
//! GraphQL `errors` array. An [`ErrorConvention`] describes how one provider
//! signals failure inside a successful response.

use super::envelope::{ResultMetadata, ToolResult};
use super::error::ToolError;
use serde_json::{Map, Value};
use std::time::Duration;

/// Maximum characters of a raw body quoted in an error message.
const MAX_QUOTED_BODY_CHARS: usize = 200;

/// Body fields searched, in order, for a human-readable provider message.
const MESSAGE_FIELDS: &[&str] = &["message", "msg", "error_description", "detail"];

/// A provider response as seen by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header, in seconds.
    pub retry_after: Option<u64>,
    pub request_id: Option<String>,
}

impl ProviderResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
            request_id: None,
        }
    }

    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// How a provider reports errors inside an HTTP 2xx body.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorConvention {
    /// Top-level field holding the provider status code. `None` disables
    /// code inspection.
    pub code_field: Option<String>,
    /// Codes meaning success. Compared as strings so `1` and `"1"` match.
    pub success_codes: Vec<String>,
    /// Codes meaning throttling; classified as rate limits.
    pub rate_limit_codes: Vec<String>,
    /// Field unwrapped as the output on success (e.g. `result`, `data`).
    pub payload_field: Option<String>,
}

impl Default for ErrorConvention {
    fn default() -> Self {
        Self {
            code_field: Some("code".to_string()),
            success_codes: vec!["0".into(), "1".into(), "200".into()],
            rate_limit_codes: vec!["429".into()],
            payload_field: None,
        }
    }
}

impl ErrorConvention {
    /// A convention that only looks at `error`/`errors` fields.
    pub fn without_codes() -> Self {
        Self {
            code_field: None,
            ..Self::default()
        }
    }

    pub fn code_field(mut self, field: impl Into<String>) -> Self {
        self.code_field = Some(field.into());
        self
    }

    pub fn success_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.success_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn rate_limit_code(mut self, code: impl Into<String>) -> Self {
        self.rate_limit_codes.push(code.into());
        self
    }

    pub fn payload_field(mut self, field: impl Into<String>) -> Self {
        self.payload_field = Some(field.into());
        self
    }
}

/// Classify a response into an envelope with provider metadata attached.
pub fn classify_response(
    provider: &str,
    convention: &ErrorConvention,
    response: &ProviderResponse,
) -> ToolResult {
    ToolResult::from_result(interpret(provider, convention, response))
        .with_metadata(response_metadata(provider, response))
}

/// Provenance of a response: provider, status, request id, retry hint.
pub fn response_metadata(provider: &str, response: &ProviderResponse) -> ResultMetadata {
    let mut metadata = ResultMetadata::for_provider(provider).http_status(response.status);
    if let Some(id) = &response.request_id {
        metadata = metadata.request_id(id.clone());
    }
    if let Some(secs) = response.retry_after {
        metadata = metadata.retry_after_secs(secs);
    }
    metadata
}

/// Core of [`classify_response`] without metadata.
pub fn interpret(
    provider: &str,
    convention: &ErrorConvention,
    response: &ProviderResponse,
) -> Result<Value, ToolError> {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();

    if response.status == 429 {
        return Err(ToolError::RateLimited {
            provider: provider.to_string(),
            message: parsed
                .as_ref()
                .and_then(extract_message)
                .unwrap_or_else(|| "HTTP 429".to_string()),
            retry_after: response.retry_after.map(Duration::from_secs),
        });
    }

    if !response.is_success_status() {
        let message = parsed
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| quote_body(&response.body));
        return Err(ToolError::HttpStatus {
            provider: provider.to_string(),
            status: response.status,
            message,
        });
    }

    let Some(body) = parsed else {
        if response.body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        return Ok(Value::String(response.body.clone()));
    };

    check_embedded_error(provider, convention, &body)?;

    match (&convention.payload_field, &body) {
        (Some(field), Value::Object(map)) if map.contains_key(field) => {
            Ok(map.get(field).cloned().unwrap_or(Value::Null))
        }
        _ => Ok(body),
    }
}

/// Inspect a 2xx JSON body for an error the provider embedded in it.
fn check_embedded_error(
    provider: &str,
    convention: &ErrorConvention,
    body: &Value,
) -> Result<(), ToolError> {
    let Value::Object(map) = body else {
        return Ok(());
    };

    if let Some(err) = map.get("error")
        && is_error_set(err)
    {
        return Err(ToolError::Provider {
            provider: provider.to_string(),
            code: map.get("code").and_then(code_string),
            message: unwrap_error_value(err)
                .or_else(|| extract_message(body))
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    if let Some(Value::Array(errors)) = map.get("errors")
        && errors.iter().any(is_error_set)
    {
        let message = errors
            .iter()
            .find_map(unwrap_error_value)
            .unwrap_or_else(|| format!("{} error(s)", errors.len()));
        return Err(ToolError::Provider {
            provider: provider.to_string(),
            code: None,
            message,
        });
    }

    if let Some(field) = &convention.code_field
        && let Some(code) = map.get(field).and_then(code_string)
        && !convention.success_codes.contains(&code)
    {
        let message = extract_message(body).unwrap_or_else(|| "no message".to_string());
        if convention.rate_limit_codes.contains(&code) {
            return Err(ToolError::RateLimited {
                provider: provider.to_string(),
                message: format!("{code}: {message}"),
                retry_after: None,
            });
        }
        return Err(ToolError::Provider {
            provider: provider.to_string(),
            code: Some(code),
            message,
        });
    }

    Ok(())
}

/// Whether an `error` value reports something. Providers fill the field with
/// `null`, `false`, `""`, `0` or `{}` on success.
fn is_error_set(err: &Value) -> bool {
    match err {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => items.iter().any(is_error_set),
        Value::Bool(true) => true,
    }
}

/// Pull a readable message out of an error body.
fn extract_message(body: &Value) -> Option<String> {
    let map = body.as_object()?;
    for field in MESSAGE_FIELDS {
        if let Some(Value::String(s)) = map.get(*field)
            && !s.trim().is_empty()
        {
            return Some(s.clone());
        }
    }
    map.get("error").and_then(unwrap_error_value)
}

/// `"boom"` → `boom`; `{"message": "boom"}` → `boom`.
fn unwrap_error_value(err: &Value) -> Option<String> {
    match err {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => MESSAGE_FIELDS.iter().find_map(|f| match map.get(*f) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        }),
        _ => None,
    }
}

fn code_string(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn quote_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    let mut quoted: String = trimmed.chars().take(MAX_QUOTED_BODY_CHARS).collect();
    if trimmed.chars().count() > MAX_QUOTED_BODY_CHARS {
        quoted.push_str("...");
    }
    quoted
}
