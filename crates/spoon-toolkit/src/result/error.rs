//! Failure taxonomy for external-API-backed operations.
//!
//! [`ToolError`] carries the detail of one failure; [`ToolErrorKind`] is the
//! coarse classification callers branch on (back off on rate limits, fix
//! configuration, report provider errors). Every `ToolError` ends up inside a
//! failed [`ToolResult`](super::ToolResult) at the operation boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Coarse failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Required credential or configuration missing or invalid. Detected
    /// before any network call.
    Configuration,
    /// Network failure, timeout, TLS or connection issue.
    Transport,
    /// Upstream reached but answered with an error status or an embedded
    /// error payload.
    Provider,
    /// Provider throttling (HTTP 429 or a provider-specific code).
    RateLimit,
    /// Caller supplied malformed arguments.
    Validation,
}

impl ToolErrorKind {
    /// Stable lowercase label used as the message prefix.
    pub fn label(self) -> &'static str {
        match self {
            Self::Configuration => "configuration error",
            Self::Transport => "transport error",
            Self::Provider => "provider error",
            Self::RateLimit => "rate limited",
            Self::Validation => "validation error",
        }
    }

    /// Whether a caller may reasonably retry after this kind of failure.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transport | Self::RateLimit)
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single operation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("missing credential {0}")]
    MissingCredential(String),

    #[error("invalid value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("network failure: {0}")]
    Network(String),

    #[error("{provider} returned HTTP {status}: {message}")]
    HttpStatus {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} reported {}", provider_detail(.code.as_deref(), .message))]
    Provider {
        provider: String,
        code: Option<String>,
        message: String,
    },

    #[error("{provider} throttled the request: {message}")]
    RateLimited {
        provider: String,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("invalid argument `{field}`: {message}")]
    InvalidArgument { field: String, message: String },
}

fn provider_detail(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

impl ToolError {
    /// The taxonomy kind this failure belongs to.
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::MissingCredential(_) | Self::InvalidConfig { .. } => {
                ToolErrorKind::Configuration
            }
            Self::Timeout(_) | Self::Network(_) => ToolErrorKind::Transport,
            Self::HttpStatus { .. } | Self::Provider { .. } => ToolErrorKind::Provider,
            Self::RateLimited { .. } => ToolErrorKind::RateLimit,
            Self::InvalidArgument { .. } => ToolErrorKind::Validation,
        }
    }

    /// Message with the kind prefix, as stored in a failed envelope.
    pub fn describe(&self) -> String {
        format!("{}: {self}", self.kind())
    }

    /// Provider-suggested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }
}
