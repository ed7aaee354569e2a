//! The operation abstraction.
//!
//! An [`Operation`] is one external-API-backed call (look up a token's
//! security report, list repository issues, synthesize speech). It declares
//! what the [`ToolExecutor`](super::executor::ToolExecutor) needs to run it
//! safely: a name for cache keys, an argument schema, required credentials,
//! whether results may be cached, and which cached operations it makes
//! stale. The executor does the rest.

use crate::api::transport::Transport;
use crate::result::{ToolError, ToolResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Boxed future returned by [`Operation::execute`].
pub type OperationFuture<'a> = Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

// ── CallContext ────────────────────────────────────────────────────

/// What an operation gets to work with for a single call: the shared
/// transport, the credentials it declared (already resolved), and its
/// timeout. Cheap to clone.
#[derive(Clone)]
pub struct CallContext {
    transport: Arc<dyn Transport>,
    credentials: Arc<HashMap<String, String>>,
    timeout: Duration,
}

impl CallContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: HashMap<String, String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            credentials: Arc::new(credentials),
            timeout,
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// A credential the operation listed in
    /// [`Operation::required_credentials`].
    pub fn credential(&self, name: &str) -> Option<&str> {
        self.credentials.get(name).map(String::as_str)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret values.
        f.debug_struct("CallContext")
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ── Operation trait ────────────────────────────────────────────────

/// An external-API-backed operation.
///
/// Only [`name`](Operation::name) and [`execute`](Operation::execute) are
/// required. `execute` must not panic: every failure is returned as a failed
/// [`ToolResult`].
pub trait Operation: Send + Sync {
    /// Operation name; the first component of every cache key.
    fn name(&self) -> &str;

    /// Provider label used in messages and metadata.
    fn provider(&self) -> &str {
        "unknown"
    }

    /// JSON Schema for the arguments, checked before any network call.
    fn parameters(&self) -> Option<Value> {
        None
    }

    /// Extra argument checks that a schema cannot express.
    fn validate(&self, _args: &Value) -> Result<(), ToolError> {
        Ok(())
    }

    /// Credential names that must be configured before the call.
    fn required_credentials(&self) -> Vec<String> {
        Vec::new()
    }

    /// The arguments that go into the cache key. Override to normalize
    /// semantically equal inputs (lowercased addresses, trimmed ids).
    fn cache_args(&self, args: &Value) -> Value {
        args.clone()
    }

    /// Whether successful results may be served from the cache.
    /// Defaults to `false`.
    fn cacheable(&self) -> bool {
        false
    }

    /// Operations whose cached results become stale once this one succeeds.
    fn invalidates(&self) -> Vec<String> {
        Vec::new()
    }

    /// Per-operation timeout, overriding the executor default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Perform the call.
    fn execute(&self, ctx: CallContext, args: Value) -> OperationFuture<'_>;
}

// ── FnOperation ────────────────────────────────────────────────────

/// Type-erased async handler for [`FnOperation`].
type ErasedHandler = Box<
    dyn Fn(CallContext, Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>
        + Send
        + Sync,
>;

/// A closure-based operation that auto-parses arguments.
///
/// Handy for operations that are not plain HTTP calls (SDK clients, local
/// computations worth caching) and for tests.
///
/// ```ignore
/// #[derive(Deserialize, JsonSchema)]
/// struct BalanceArgs { address: String }
///
/// let op = FnOperation::new("get_balance", |_ctx, args: BalanceArgs| async move {
///     Ok(json!({"address": args.address, "balance": "0"}))
/// })
/// .with_provider("rpc")
/// .with_parameters(json_schema_for::<BalanceArgs>())
/// .with_cacheable(true);
/// ```
pub struct FnOperation {
    name: String,
    provider: String,
    parameters: Option<Value>,
    credentials: Vec<String>,
    cacheable: bool,
    invalidates: Vec<String>,
    timeout: Option<Duration>,
    handler: ErasedHandler,
}

impl FnOperation {
    /// Create a closure-based operation. Arguments are deserialized into `A`;
    /// a mismatch becomes a `Validation` failure.
    pub fn new<A, F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        A: serde::de::DeserializeOwned + Send + 'static,
        F: Fn(CallContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let erased = move |ctx: CallContext,
                           raw: Value|
              -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>> {
            match serde_json::from_value::<A>(raw) {
                Ok(args) => Box::pin(handler(ctx, args)),
                Err(e) => {
                    let err = ToolError::invalid_argument("arguments", e.to_string());
                    Box::pin(async move { Err(err) })
                }
            }
        };
        Self {
            name: name.into(),
            provider: "local".to_string(),
            parameters: None,
            credentials: Vec::new(),
            cacheable: false,
            invalidates: Vec::new(),
            timeout: None,
            handler: Box::new(erased),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }

    pub fn requires_credential(mut self, name: impl Into<String>) -> Self {
        self.credentials.push(name.into());
        self
    }

    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    /// Mark this operation as a mutation that makes `operation` stale.
    pub fn with_invalidation(mut self, operation: impl Into<String>) -> Self {
        self.invalidates.push(operation.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Operation for FnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn parameters(&self) -> Option<Value> {
        self.parameters.clone()
    }

    fn required_credentials(&self) -> Vec<String> {
        self.credentials.clone()
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }

    fn invalidates(&self) -> Vec<String> {
        self.invalidates.clone()
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn execute(&self, ctx: CallContext, args: Value) -> OperationFuture<'_> {
        let fut = (self.handler)(ctx, args);
        Box::pin(async move { ToolResult::from_result(fut.await) })
    }
}

impl fmt::Debug for FnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate arguments against the operation's declared JSON Schema.
///
/// All schema violations are reported in one `Validation` error, keyed by
/// the first failing path.
pub fn validate_arguments(op: &dyn Operation, args: &Value) -> Result<(), ToolError> {
    let Some(schema) = op.parameters() else {
        return Ok(());
    };

    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            return Err(ToolError::invalid_config(
                format!("{} parameters", op.name()),
                e.to_string(),
            ));
        }
    };

    let errors: Vec<(String, String)> = validator
        .iter_errors(args)
        .map(|e| (e.instance_path().to_string(), e.to_string()))
        .collect();

    let Some((first_path, _)) = errors.first() else {
        return Ok(());
    };
    let field = if first_path.is_empty() {
        "arguments".to_string()
    } else {
        first_path.trim_start_matches('/').to_string()
    };
    let message = errors
        .iter()
        .map(|(_, msg)| msg.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(ToolError::invalid_argument(field, message))
}

/// Generate a JSON Schema from a type that implements
/// `schemars::JsonSchema`, for [`Operation::parameters`].
pub fn json_schema_for<T: schemars::JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
