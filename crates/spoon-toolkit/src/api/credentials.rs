//! Where operations get their API keys.
//!
//! Credentials are looked up once per call, before any network traffic, so a
//! missing key short-circuits into a `Configuration` failure naming the key.

use crate::result::ToolError;
use std::collections::HashMap;
use tracing::warn;

/// Source of named secrets.
pub trait CredentialSource: Send + Sync {
    /// The secret for `name`, or `None` when unset or blank.
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads credentials from environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Fixed in-memory credentials, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn get(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Fetch `name` or fail with [`ToolError::MissingCredential`].
pub fn require_credential(source: &dyn CredentialSource, name: &str) -> Result<String, ToolError> {
    source.get(name).ok_or_else(|| {
        warn!("credential {name} is not configured");
        ToolError::MissingCredential(name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ToolErrorKind;

    #[test]
    fn static_lookup() {
        let creds = StaticCredentials::new().with("GOPLUS_API_KEY", "k-1");
        assert_eq!(creds.get("GOPLUS_API_KEY").as_deref(), Some("k-1"));
        assert_eq!(creds.get("OTHER"), None);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let creds = StaticCredentials::new().with("DISCORD_BOT_TOKEN", "   ");
        assert_eq!(creds.get("DISCORD_BOT_TOKEN"), None);
    }

    #[test]
    fn require_names_the_missing_key() {
        let err = require_credential(&StaticCredentials::new(), "ELEVENLABS_API_KEY").unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::Configuration);
        assert!(err.to_string().contains("ELEVENLABS_API_KEY"));
    }

    #[test]
    fn env_missing_variable_is_none() {
        assert_eq!(
            EnvCredentials.get("SPOON_TOOLKIT_TEST_SURELY_UNSET_VARIABLE"),
            None
        );
    }
}
