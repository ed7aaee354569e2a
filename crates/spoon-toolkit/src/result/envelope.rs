//! The uniform success/error envelope returned by every operation.

use super::error::{ToolError, ToolErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Provenance attached to a [`ToolResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    /// Anything else a provider wants to surface (pagination cursors,
    /// quota headers, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl ResultMetadata {
    /// Metadata stamped with the current time.
    pub fn now() -> Self {
        Self {
            provider: None,
            request_id: None,
            timestamp: Utc::now(),
            elapsed_ms: None,
            http_status: None,
            retry_after_secs: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn for_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::now()
        }
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn elapsed_ms(mut self, ms: u64) -> Self {
        self.elapsed_ms = Some(ms);
        self
    }

    pub fn http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn retry_after_secs(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Success(Value),
    Failure { kind: ToolErrorKind, message: String },
}

/// Result of one external-API-backed operation.
///
/// Either a success carrying the provider payload, or a failure carrying a
/// short classified message. Never both, never neither. Values are built
/// once and not mutated afterwards; the `with_*` methods consume `self`.
///
/// ```
/// use spoon_toolkit::result::{ToolError, ToolResult};
/// use serde_json::json;
///
/// let ok = ToolResult::success(json!({"holders": 12}));
/// assert!(ok.is_success());
/// assert!(ok.error().is_none());
///
/// let failed = ToolResult::failure(ToolError::MissingCredential("GOPLUS_API_KEY".into()));
/// assert!(failed.output().is_none());
/// assert!(failed.error().unwrap().contains("GOPLUS_API_KEY"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ToolResultRepr", try_from = "ToolResultRepr")]
pub struct ToolResult {
    outcome: Outcome,
    metadata: Option<ResultMetadata>,
}

impl ToolResult {
    /// A successful result. A `null` payload becomes an empty object so that
    /// `output` is always present on success.
    pub fn success(output: impl Into<Value>) -> Self {
        let output = match output.into() {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Self {
            outcome: Outcome::Success(output),
            metadata: None,
        }
    }

    /// A failed result built from a classified error.
    pub fn failure(error: impl Into<ToolError>) -> Self {
        let error = error.into();
        let metadata = error
            .retry_after()
            .map(|d| ResultMetadata::now().retry_after_secs(d.as_secs()));
        Self {
            outcome: Outcome::Failure {
                kind: error.kind(),
                message: error.describe(),
            },
            metadata,
        }
    }

    /// A failed result from an explicit kind and message. The message is
    /// stored as given.
    pub fn from_kind(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure {
                kind,
                message: message.into(),
            },
            metadata: None,
        }
    }

    /// Wrap a `Result` produced inside an operation.
    pub fn from_result(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(v) => Self::success(v),
            Err(e) => Self::failure(e),
        }
    }

    /// Attach metadata. Fields already recorded from the error (retry-after)
    /// are kept when the new metadata leaves them empty.
    pub fn with_metadata(mut self, mut metadata: ResultMetadata) -> Self {
        if let Some(previous) = self.metadata.take() {
            metadata.retry_after_secs = metadata.retry_after_secs.or(previous.retry_after_secs);
        }
        self.metadata = Some(metadata);
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// The payload, present only on success.
    pub fn output(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(v) => Some(v),
            Outcome::Failure { .. } => None,
        }
    }

    /// The classified message, present only on failure.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure { message, .. } => Some(message),
        }
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn metadata(&self) -> Option<&ResultMetadata> {
        self.metadata.as_ref()
    }

    /// Consume the envelope into a standard `Result`.
    pub fn into_result(self) -> Result<Value, (ToolErrorKind, String)> {
        match self.outcome {
            Outcome::Success(v) => Ok(v),
            Outcome::Failure { kind, message } => Err((kind, message)),
        }
    }

    /// Render for an LLM tool-call reply: the payload (strings unquoted), or
    /// `Error: <message>`. Truncated to `max_bytes` on a char boundary.
    pub fn to_tool_output(&self, max_bytes: usize) -> String {
        let text = match &self.outcome {
            Outcome::Success(Value::String(s)) => s.clone(),
            Outcome::Success(v) => v.to_string(),
            Outcome::Failure { message, .. } => format!("Error: {message}"),
        };
        truncate_output(text, max_bytes)
    }
}

impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Success(v) => write!(f, "ok: {v}"),
            Outcome::Failure { message, .. } => write!(f, "failed: {message}"),
        }
    }
}

impl From<Result<Value, ToolError>> for ToolResult {
    fn from(result: Result<Value, ToolError>) -> Self {
        Self::from_result(result)
    }
}

/// Truncate to at most `max` bytes, appending a notice if trimmed.
pub fn truncate_output(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let head = s.get(..end).unwrap_or_default();
    format!("{head}...\n[truncated: {} bytes total]", s.len())
}

// ── Wire form ──────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ToolResultRepr {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_kind: Option<ToolErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<ResultMetadata>,
}

impl From<ToolResult> for ToolResultRepr {
    fn from(result: ToolResult) -> Self {
        match result.outcome {
            Outcome::Success(output) => Self {
                success: true,
                output: Some(output),
                error: None,
                error_kind: None,
                metadata: result.metadata,
            },
            Outcome::Failure { kind, message } => Self {
                success: false,
                output: None,
                error: Some(message),
                error_kind: Some(kind),
                metadata: result.metadata,
            },
        }
    }
}

impl TryFrom<ToolResultRepr> for ToolResult {
    type Error = String;

    fn try_from(repr: ToolResultRepr) -> Result<Self, Self::Error> {
        let outcome = match (repr.success, repr.output, repr.error) {
            (true, Some(output), None) if !output.is_null() => Outcome::Success(output),
            (false, None, Some(message)) => Outcome::Failure {
                // Envelopes written by older producers may lack a kind.
                kind: repr.error_kind.unwrap_or(ToolErrorKind::Provider),
                message,
            },
            (success, output, error) => {
                return Err(format!(
                    "malformed tool result: success={success}, output {}, error {}",
                    if output.is_some() { "set" } else { "unset" },
                    if error.is_some() { "set" } else { "unset" },
                ));
            }
        };
        Ok(Self {
            outcome,
            metadata: repr.metadata,
        })
    }
}
