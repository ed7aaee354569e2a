//! Cached, classified calls to third-party APIs for agent tools.
//!
//! `spoon-toolkit` gives every tool that wraps an external provider (market
//! data, security scanners, chain explorers, storage, social APIs) the same
//! two things: a uniform [`ToolResult`](result::ToolResult) envelope that is
//! either a success with output or a failure with a message, and a
//! [`ResultCache`](cache::ResultCache) that memoizes results for a TTL so
//! repeated calls with the same arguments skip the network.
//!
//! The [`ToolExecutor`](tools::executor::ToolExecutor) composes the two with
//! argument validation, credential resolution, per-call timeouts and
//! mutation-driven invalidation. Operations only describe their request.
//!
//! # Getting started
//!
//! ```ignore
//! use spoon_toolkit::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ToolError> {
//!     let config = ToolkitConfig::from_env()?;
//!     let transport = Arc::new(config.build_transport()?);
//!     let executor = config.build_executor(transport);
//!
//!     // GoPlus-style API: HTTP 200 with {"code": 1, "result": {...}}.
//!     let token_security = HttpOperation::get(
//!         "token_security",
//!         "goplus",
//!         "https://api.gopluslabs.io/api/v1/token_security/{chain_id}",
//!     )
//!     .auth_header("GOPLUS_API_KEY", "Authorization", Some("Bearer "))
//!     .convention(ErrorConvention::default().payload_field("result"))
//!     .lowercase("contract_addresses");
//!
//!     let args = serde_json::json!({"chain_id": 1, "contract_addresses": "0xABC"});
//!     let first = executor.run(&token_security, args.clone()).await;
//!     // Same arguments within the TTL: served from cache.
//!     let second = executor.run(&token_security, args).await;
//!     assert_eq!(first, second);
//!
//!     println!("{first}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Return results from a tool:** [`ToolResult::success`](result::ToolResult::success)
//!   and [`ToolResult::failure`](result::ToolResult::failure). Failures carry a
//!   [`ToolErrorKind`](result::ToolErrorKind) so callers can branch without
//!   parsing messages.
//!
//! - **Turn a provider response into a result:** [`result::classify`] handles
//!   non-2xx statuses, `429` with `Retry-After`, and errors embedded in HTTP 200
//!   bodies via an [`ErrorConvention`](result::ErrorConvention).
//!
//! - **Cache directly:** [`ResultCache::get`](cache::ResultCache::get) and
//!   [`ResultCache::put`](cache::ResultCache::put), keyed by operation name and
//!   canonicalized arguments. Optional capacity bound and background sweep.
//!
//! - **Define an operation:** [`HttpOperation`](tools::http::HttpOperation)
//!   for REST calls, [`FnOperation`](tools::operation::FnOperation) for
//!   closures, or implement [`Operation`](tools::operation::Operation).
//!
//! - **Retry transient failures:** [`retry_with_backoff`](api::retry::retry_with_backoff).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`result`] | [`ToolResult`](result::ToolResult) envelope, error taxonomy, response classification |
//! | [`cache`] | [`ResultCache`](cache::ResultCache), cache keys, background sweeper |
//! | [`api`] | HTTP transport, credentials, retry with backoff |
//! | [`tools`] | [`Operation`](tools::operation::Operation) trait, HTTP operations, [`ToolExecutor`](tools::executor::ToolExecutor) |
//! | [`config`] | [`ToolkitConfig`](config::ToolkitConfig) and `TOOLKIT_*` environment loading |
//!
//! # Design principles
//!
//! 1. **Tools never throw.** Every failure, including a missing API key or a
//!    timeout, comes back as a failed `ToolResult` with a short message.
//!
//! 2. **Only good answers are remembered.** Successes are cached; provider
//!    failures only when negative caching is configured, and transient
//!    failures never.
//!
//! 3. **Collaborators are injected.** The cache, transport and credential
//!    source are passed in, so tests run without network or environment.

pub mod api;
pub mod cache;
pub mod config;
pub mod prelude;
pub mod result;
pub mod tools;

pub use tools::operation::json_schema_for;

// Re-export schemars for downstream crates.
pub use schemars;
