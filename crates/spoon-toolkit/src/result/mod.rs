//! The success/error contract shared by every operation.
//!
//! - [`envelope`]: [`ToolResult`] and [`ResultMetadata`].
//! - [`error`]: [`ToolError`] and the [`ToolErrorKind`] taxonomy.
//! - [`classify`]: provider response → envelope, including errors embedded
//!   in HTTP 200 bodies.

pub mod classify;
pub mod envelope;
pub mod error;

pub use classify::{
    ErrorConvention, ProviderResponse, classify_response, interpret, response_metadata,
};
pub use envelope::{ResultMetadata, ToolResult, truncate_output};
pub use error::{ToolError, ToolErrorKind};
