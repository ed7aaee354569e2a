//! Collaborators between an operation and the outside world.
//!
//! - [`transport`]: the [`Transport`] seam and its `reqwest` implementation.
//!   Every request carries its own timeout.
//! - [`credentials`]: [`CredentialSource`] lookups that fail before any
//!   network call when a key is missing.
//! - [`retry`]: opt-in caller-side retries for transient failures
//!   (rate limits, network errors) with exponential backoff and jitter.

pub mod credentials;
pub mod retry;
pub mod transport;

// Re-export commonly used items at the module level.
pub use credentials::{CredentialSource, EnvCredentials, StaticCredentials, require_credential};
pub use retry::{RetryConfig, is_retryable, retry_with_backoff};
pub use transport::{
    DEFAULT_HTTP_TIMEOUT, HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport,
    TransportFuture,
};
