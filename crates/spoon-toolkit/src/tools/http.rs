//! Declarative REST operations.
//!
//! Most provider wrappers are the same few steps: fill a URL template, attach
//! an API key, send, and read the provider's error convention out of the
//! body. [`HttpOperation`] captures those steps as data so a wrapper is a
//! builder chain instead of a hand-written client.
//!
//! # Example
//!
//! ```ignore
//! let token_security = HttpOperation::get(
//!     "token_security",
//!     "goplus",
//!     "https://api.gopluslabs.io/api/v1/token_security/{chain_id}",
//! )
//! .auth_header("GOPLUS_API_KEY", "Authorization", Some("Bearer "))
//! .convention(ErrorConvention::default().payload_field("result"))
//! .lowercase("contract_addresses");
//! ```

use crate::api::transport::{HttpMethod, HttpRequest};
use crate::result::{
    ErrorConvention, ResultMetadata, ToolError, ToolResult, interpret, response_metadata,
};
use crate::tools::operation::{CallContext, Operation, OperationFuture};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::debug;

/// Where an API key goes on the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPlacement {
    /// `name: <prefix><key>`.
    Header { name: String, prefix: String },
    /// `?param=<key>`.
    Query { param: String },
}

/// A required credential and how it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSpec {
    pub name: String,
    pub placement: AuthPlacement,
}

/// A REST call described as data.
#[derive(Debug, Clone)]
pub struct HttpOperation {
    name: String,
    provider: String,
    method: HttpMethod,
    url_template: String,
    auth: Option<CredentialSpec>,
    headers: Vec<(String, String)>,
    convention: ErrorConvention,
    parameters: Option<Value>,
    cacheable: bool,
    invalidates: Vec<String>,
    timeout: Option<Duration>,
    lowercase_fields: Vec<String>,
}

impl HttpOperation {
    /// A new operation. `url_template` may contain `{arg}` placeholders that
    /// are filled from the call arguments. GET operations are cacheable by
    /// default; other methods are not.
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        method: HttpMethod,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            method,
            url_template: url_template.into(),
            auth: None,
            headers: Vec::new(),
            convention: ErrorConvention::default(),
            parameters: None,
            cacheable: method.is_read_only(),
            invalidates: Vec::new(),
            timeout: None,
            lowercase_fields: Vec::new(),
        }
    }

    pub fn get(
        name: impl Into<String>,
        provider: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Self {
        Self::new(name, provider, HttpMethod::Get, url_template)
    }

    pub fn post(
        name: impl Into<String>,
        provider: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Self {
        Self::new(name, provider, HttpMethod::Post, url_template)
    }

    /// Send credential `name` in header `header`, prefixed by `prefix`
    /// (e.g. `"Bearer "`).
    pub fn auth_header(
        mut self,
        name: impl Into<String>,
        header: impl Into<String>,
        prefix: Option<&str>,
    ) -> Self {
        self.auth = Some(CredentialSpec {
            name: name.into(),
            placement: AuthPlacement::Header {
                name: header.into(),
                prefix: prefix.unwrap_or_default().to_string(),
            },
        });
        self
    }

    /// Send credential `name` as query parameter `param`.
    pub fn auth_query(mut self, name: impl Into<String>, param: impl Into<String>) -> Self {
        self.auth = Some(CredentialSpec {
            name: name.into(),
            placement: AuthPlacement::Query {
                param: param.into(),
            },
        });
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn convention(mut self, convention: ErrorConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }

    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn with_invalidation(mut self, operation: impl Into<String>) -> Self {
        self.invalidates.push(operation.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Lowercase string argument `field` before sending and before keying
    /// the cache (case-insensitive identifiers such as hex addresses).
    pub fn lowercase(mut self, field: impl Into<String>) -> Self {
        self.lowercase_fields.push(field.into());
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Apply the operation's own normalization to raw arguments.
    fn normalize(&self, args: &Value) -> Value {
        let mut args = args.clone();
        if let Value::Object(map) = &mut args {
            for field in &self.lowercase_fields {
                if let Some(Value::String(s)) = map.get_mut(field) {
                    *s = s.to_lowercase();
                }
            }
        }
        args
    }

    /// Build the outbound request for `args`.
    pub fn build_request(&self, ctx: &CallContext, args: &Value) -> Result<HttpRequest, ToolError> {
        let mut remaining = match self.normalize(args) {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(ToolError::invalid_argument(
                    "arguments",
                    "expected a JSON object",
                ));
            }
        };

        let url = expand_template(&self.url_template, &mut remaining)?;
        let mut request = HttpRequest::new(self.method, url).timeout(ctx.timeout());

        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }

        if let Some(spec) = &self.auth {
            let key = ctx
                .credential(&spec.name)
                .ok_or_else(|| ToolError::MissingCredential(spec.name.clone()))?;
            request = match &spec.placement {
                AuthPlacement::Header { name, prefix } => {
                    request.header(name.clone(), format!("{prefix}{key}"))
                }
                AuthPlacement::Query { param } => request.query(param.clone(), key),
            };
        }

        match self.method {
            HttpMethod::Get | HttpMethod::Delete => {
                for (k, v) in remaining {
                    if let Some(s) = query_value(&v) {
                        request = request.query(k, s);
                    }
                }
            }
            HttpMethod::Post | HttpMethod::Put => {
                if !remaining.is_empty() {
                    request = request.json(Value::Object(remaining));
                }
            }
        }

        Ok(request)
    }
}

impl Operation for HttpOperation {
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
        self.auth.iter().map(|a| a.name.clone()).collect()
    }

    fn cache_args(&self, args: &Value) -> Value {
        self.normalize(args)
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
        Box::pin(async move {
            let request = match self.build_request(&ctx, &args) {
                Ok(r) => r,
                Err(e) => {
                    return ToolResult::failure(e)
                        .with_metadata(ResultMetadata::for_provider(&self.provider));
                }
            };

            let start = Instant::now();
            let response = ctx.transport().send(request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match response {
                Ok(resp) => {
                    debug!(
                        "{} ({}) answered HTTP {} in {elapsed_ms}ms",
                        self.name, self.provider, resp.status
                    );
                    let metadata = response_metadata(&self.provider, &resp).elapsed_ms(elapsed_ms);
                    ToolResult::from_result(interpret(&self.provider, &self.convention, &resp))
                        .with_metadata(metadata)
                }
                Err(e) => ToolResult::failure(e).with_metadata(
                    ResultMetadata::for_provider(&self.provider).elapsed_ms(elapsed_ms),
                ),
            }
        })
    }
}

/// Fill `{arg}` placeholders from `args`, removing the consumed entries.
fn expand_template(template: &str, args: &mut Map<String, Value>) -> Result<String, ToolError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((head, after)) = rest.split_once('{') {
        out.push_str(head);
        let Some((name, tail)) = after.split_once('}') else {
            return Err(ToolError::invalid_config(
                "url_template",
                format!("unclosed placeholder in '{template}'"),
            ));
        };
        let value = args
            .remove(name)
            .as_ref()
            .and_then(query_value)
            .ok_or_else(|| ToolError::invalid_argument(name, "required by the request URL"))?;
        out.push_str(&urlencoding::encode(&value));
        rest = tail;
    }
    out.push_str(rest);
    Ok(out)
}

/// Scalar argument as a string; arrays of scalars are comma-joined (the
/// convention for multi-value lookups); objects are sent as JSON.
fn query_value(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(v.to_string()),
    }
}
