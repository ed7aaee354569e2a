//! Convenience re-exports for common `spoon-toolkit` types.
//!
//! Meant to be glob-imported when writing tools:
//!
//! ```ignore
//! use spoon_toolkit::prelude::*;
//! ```
//!
//! Specialized items (canonical key encoding, sweeper handles, raw
//! classification helpers) are left out; import those from their modules.

// ── Results ─────────────────────────────────────────────────────────
pub use crate::result::{ErrorConvention, ResultMetadata, ToolError, ToolErrorKind, ToolResult};

// ── Cache ───────────────────────────────────────────────────────────
pub use crate::cache::{CacheStats, KeyPolicy, ResultCache};

// ── Providers ───────────────────────────────────────────────────────
pub use crate::api::{
    CredentialSource, EnvCredentials, ReqwestTransport, RetryConfig, StaticCredentials, Transport,
    retry_with_backoff,
};

// ── Operations ──────────────────────────────────────────────────────
pub use crate::config::ToolkitConfig;
pub use crate::json_schema_for;
pub use crate::tools::{CallContext, FnOperation, HttpOperation, Operation, ToolExecutor};
