//! Operations backed by third-party APIs, and the executor that runs them.
//!
//! Every provider call is an [`Operation`] trait implementor. Operations are
//! run through a [`ToolExecutor`], which handles validation, credentials,
//! caching, timeouts and invalidation so that each operation only has to
//! describe its request.
//!
//! # Defining operations
//!
//! - **[`HttpOperation`]**: declarative REST call with a URL template,
//!   credential placement and an [`ErrorConvention`](crate::result::ErrorConvention).
//!   Covers most providers.
//! - **[`FnOperation`]**: closure-based, auto-parses arguments. Best for
//!   SDK-style calls or composed lookups.
//! - **`impl Operation`**: full control.
//!
//! # Submodules
//!
//! - [`operation`]: [`Operation`] trait, [`CallContext`], [`FnOperation`],
//!   schema validation.
//! - [`http`]: [`HttpOperation`] and credential placement.
//! - [`executor`]: [`ToolExecutor`].

pub mod executor;
pub mod http;
pub mod operation;

pub use executor::{ToolExecutor, log_operation_call};
pub use http::{AuthPlacement, CredentialSpec, HttpOperation};
pub use operation::{
    CallContext, FnOperation, Operation, OperationFuture, json_schema_for, validate_arguments,
};
