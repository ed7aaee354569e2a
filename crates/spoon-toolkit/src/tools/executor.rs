//! Runs operations through validation, credentials, cache, and timeout.
//!
//! [`ToolExecutor::run`] is the whole contract in one call:
//!
//! 1. validate arguments (schema, then [`Operation::validate`]);
//! 2. resolve required credentials, failing before any network call;
//! 3. serve a fresh cached result for cacheable operations;
//! 4. execute under a timeout, turning a timeout into a `Transport` failure;
//! 5. on success, invalidate the operations this one makes stale;
//! 6. cache successes, and provider failures only if negative caching is on.
//!
//! Nothing here retries; see [`retry_with_backoff`](crate::api::retry::retry_with_backoff).

use crate::api::credentials::{CredentialSource, EnvCredentials, require_credential};
use crate::api::transport::{DEFAULT_HTTP_TIMEOUT, Transport};
use crate::cache::{CacheKey, ResultCache};
use crate::result::{ResultMetadata, ToolError, ToolErrorKind, ToolResult};
use crate::tools::operation::{CallContext, Operation, validate_arguments};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Shared runner for operations. Build once per process and share.
pub struct ToolExecutor {
    cache: Arc<ResultCache>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSource>,
    default_timeout: Duration,
    /// TTL for successes. `None` uses the cache's default.
    success_ttl: Option<Duration>,
    /// TTL for provider failures. `None` disables negative caching.
    failure_ttl: Option<Duration>,
}

impl fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("cache_entries", &self.cache.len())
            .field("default_timeout", &self.default_timeout)
            .field("success_ttl", &self.success_ttl)
            .field("failure_ttl", &self.failure_ttl)
            .finish()
    }
}

impl ToolExecutor {
    /// An executor with a fresh cache, environment credentials, and the
    /// default 30s timeout.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            cache: Arc::new(ResultCache::new()),
            transport,
            credentials: Arc::new(EnvCredentials),
            default_timeout: DEFAULT_HTTP_TIMEOUT,
            success_ttl: None,
            failure_ttl: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_success_ttl(mut self, ttl: Duration) -> Self {
        self.success_ttl = Some(ttl);
        self
    }

    /// Enable negative caching of provider failures for `ttl`.
    pub fn with_failure_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.failure_ttl = ttl;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run one operation. Never fails; every problem is a failed result.
    pub async fn run(&self, op: &dyn Operation, args: Value) -> ToolResult {
        let name = op.name();
        log_operation_call(name, &args);

        if let Err(e) = validate_arguments(op, &args).and_then(|()| op.validate(&args)) {
            debug!("{name}: rejected arguments: {e}");
            return fail(op, e);
        }

        let mut credentials = HashMap::new();
        for cred in op.required_credentials() {
            match require_credential(self.credentials.as_ref(), &cred) {
                Ok(secret) => {
                    credentials.insert(cred, secret);
                }
                Err(e) => return fail(op, e),
            }
        }

        let key = op
            .cacheable()
            .then(|| self.cache.key_for(name, &op.cache_args(&args)));
        if let Some(key) = &key
            && let Some(hit) = self.cache.get_key(key)
        {
            info!("[op] {name}: served from cache");
            return hit;
        }

        let timeout = op.timeout().unwrap_or(self.default_timeout);
        let ctx = CallContext::new(Arc::clone(&self.transport), credentials, timeout);
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, op.execute(ctx, args)).await {
            Ok(r) => r,
            Err(_) => {
                let elapsed = start.elapsed();
                warn!(
                    "{name} timed out after {:.1}s (limit: {:.0}s)",
                    elapsed.as_secs_f64(),
                    timeout.as_secs_f64()
                );
                ToolResult::failure(ToolError::Timeout(timeout)).with_metadata(
                    ResultMetadata::for_provider(op.provider())
                        .elapsed_ms(elapsed.as_millis() as u64),
                )
            }
        };

        let elapsed = start.elapsed();
        match result.error() {
            None => debug!("[op] {name} succeeded in {:.1}s", elapsed.as_secs_f64()),
            Some(err) => info!("[op] {name} failed in {:.1}s: {err}", elapsed.as_secs_f64()),
        }

        if result.is_success() {
            for stale in op.invalidates() {
                self.cache.invalidate_operation(&stale);
            }
        }

        if let Some(key) = key {
            self.store(key, &result);
        }

        result
    }

    /// Run several operations concurrently. Results keep input order.
    pub async fn run_all(&self, calls: Vec<(&dyn Operation, Value)>) -> Vec<ToolResult> {
        futures::future::join_all(calls.into_iter().map(|(op, args)| self.run(op, args))).await
    }

    fn store(&self, key: CacheKey, result: &ToolResult) {
        let ttl = match result.error_kind() {
            None => Some(self.success_ttl.unwrap_or(self.cache.default_ttl())),
            // Transport, throttling, configuration and validation failures
            // are transient or local; only provider verdicts are kept.
            Some(ToolErrorKind::Provider) => self.failure_ttl,
            Some(_) => None,
        };
        if let Some(ttl) = ttl {
            self.cache.put_key(key, result.clone(), ttl);
        }
    }
}

fn fail(op: &dyn Operation, error: ToolError) -> ToolResult {
    ToolResult::failure(error).with_metadata(ResultMetadata::for_provider(op.provider()))
}

/// Log an operation call at INFO level with a truncated preview of arguments.
pub fn log_operation_call(name: &str, args: &Value) {
    let rendered = args.to_string();
    info!("[op] {name}({})", preview(&rendered, 120));
    trace!("[op] {name} arguments: {rendered}");
}

/// First `max` characters of `s`, with `...` only when something was cut.
fn preview(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let mut out: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::credentials::StaticCredentials;
    use crate::api::transport::{HttpRequest, HttpResponse, TransportFuture};
    use crate::result::{ErrorConvention, ProviderResponse};
    use crate::tools::http::HttpOperation;
    use crate::tools::operation::FnOperation;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls, optionally stalls, then answers with the queued reply.
    struct FakeTransport {
        calls: AtomicUsize,
        replies: Mutex<Vec<HttpResponse>>,
        delay: Duration,
    }

    impl FakeTransport {
        fn replying(body: Value) -> Arc<Self> {
            Self::with_status(200, body)
        }

        fn with_status(status: u16, body: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                replies: Mutex::new(vec![ProviderResponse::new(status, body.to_string())]),
                delay: Duration::ZERO,
            })
        }

        fn stalling(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                replies: Mutex::new(vec![ProviderResponse::new(200, "{}")]),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, _request: HttpRequest) -> TransportFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                // The last reply repeats forever.
                if replies.len() > 1 {
                    replies.remove(0)
                } else {
                    replies[0].clone()
                }
            };
            let delay = self.delay;
            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(reply)
            })
        }
    }

    fn creds() -> Arc<StaticCredentials> {
        Arc::new(StaticCredentials::new().with("GOPLUS_API_KEY", "k"))
    }

    fn executor(transport: Arc<FakeTransport>) -> ToolExecutor {
        ToolExecutor::new(transport).with_credentials(creds())
    }

    fn token_security() -> HttpOperation {
        HttpOperation::get(
            "token_security",
            "goplus",
            "https://api.gopluslabs.io/api/v1/token_security/{chain_id}",
        )
        .auth_header("GOPLUS_API_KEY", "Authorization", Some("Bearer "))
        .convention(ErrorConvention::default().payload_field("result"))
        .lowercase("contract_addresses")
    }

    #[tokio::test]
    async fn missing_credential_short_circuits() {
        let transport = FakeTransport::replying(json!({"code": 1, "result": {}}));
        let exec = ToolExecutor::new(transport.clone())
            .with_credentials(Arc::new(StaticCredentials::new()));
        let r = exec
            .run(&token_security(), json!({"chain_id": 1, "contract_addresses": "0xabc"}))
            .await;
        assert_eq!(r.error_kind(), Some(ToolErrorKind::Configuration));
        assert!(r.error().unwrap().contains("GOPLUS_API_KEY"));
        assert_eq!(transport.calls(), 0);
        assert!(exec.cache().is_empty());
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let transport = FakeTransport::replying(json!({"code": 1, "result": {"holders": 3}}));
        let exec = executor(transport.clone());
        let op = token_security();
        let first = exec
            .run(&op, json!({"chain_id": 1, "contract_addresses": "0xABC"}))
            .await;
        // Different order and case normalize to the same key.
        let second = exec
            .run(&op, json!({"contract_addresses": "0xabc", "chain_id": 1}))
            .await;
        assert!(first.is_success());
        assert_eq!(first, second);
        assert_eq!(transport.calls(), 1);
        assert_eq!(exec.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn embedded_error_is_failure_and_not_cached_by_default() {
        let transport = FakeTransport::replying(json!({"code": 4001, "message": "invalid address"}));
        let exec = executor(transport.clone());
        let op = token_security();
        let args = json!({"chain_id": 1, "contract_addresses": "bad"});
        let r = exec.run(&op, args.clone()).await;
        assert!(!r.is_success());
        assert!(r.error().unwrap().contains("invalid address"));
        exec.run(&op, args).await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn negative_caching_uses_failure_ttl() {
        let transport = FakeTransport::replying(json!({"code": 4001, "message": "invalid address"}));
        let exec = executor(transport.clone()).with_failure_ttl(Some(Duration::from_secs(30)));
        let op = token_security();
        let args = json!({"chain_id": 1, "contract_addresses": "bad"});

        exec.run(&op, args.clone()).await;
        exec.run(&op, args.clone()).await;
        assert_eq!(transport.calls(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        exec.run(&op, args).await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn rate_limits_are_never_cached() {
        let transport = FakeTransport::with_status(429, json!({"message": "slow down"}));
        let exec = executor(transport.clone()).with_failure_ttl(Some(Duration::from_secs(30)));
        let op = token_security();
        let args = json!({"chain_id": 1, "contract_addresses": "0xabc"});
        let r = exec.run(&op, args.clone()).await;
        assert_eq!(r.error_kind(), Some(ToolErrorKind::RateLimit));
        exec.run(&op, args).await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn empty_result_is_cached_success() {
        let transport = FakeTransport::replying(json!([]));
        let exec = executor(transport.clone());
        let op = HttpOperation::get("list_issues", "github", "https://api.github.com/repos/{repo}/issues");
        let r = exec.run(&op, json!({"repo": "x", "since": "2024-01-01"})).await;
        assert!(r.is_success());
        assert_eq!(r.output(), Some(&json!([])));
        assert_eq!(exec.cache().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_becomes_transport_failure_and_is_not_cached() {
        let transport = FakeTransport::stalling(Duration::from_secs(120));
        let exec = executor(transport.clone()).with_default_timeout(Duration::from_secs(30));
        let op = token_security();
        let args = json!({"chain_id": 1, "contract_addresses": "0xabc"});

        let r = exec.run(&op, args.clone()).await;
        assert_eq!(r.error_kind(), Some(ToolErrorKind::Transport));
        assert!(r.error().unwrap().contains("timed out"));
        assert!(exec.cache().is_empty());

        exec.run(&op, args).await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn operation_timeout_overrides_default() {
        let transport = FakeTransport::stalling(Duration::from_secs(60));
        let exec = executor(transport).with_default_timeout(Duration::from_secs(30));
        let op = token_security().with_timeout(Duration::from_secs(100));
        let r = exec
            .run(&op, json!({"chain_id": 1, "contract_addresses": "0xabc"}))
            .await;
        assert!(r.is_success(), "{r}");
    }

    #[tokio::test]
    async fn validation_failure_skips_network() {
        #[derive(serde::Deserialize, schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Args {
            chain_id: u64,
            contract_addresses: String,
        }
        let transport = FakeTransport::replying(json!({}));
        let exec = executor(transport.clone());
        let op = token_security().with_parameters(crate::tools::operation::json_schema_for::<Args>());
        let r = exec.run(&op, json!({"chain_id": "one"})).await;
        assert_eq!(r.error_kind(), Some(ToolErrorKind::Validation));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn mutation_invalidates_dependent_reads() {
        let transport = FakeTransport::replying(json!([]));
        let exec = executor(transport.clone());
        let list = HttpOperation::get("list_objects", "s3", "https://s3.example.com/{bucket}");
        let put = HttpOperation::new(
            "put_object",
            "s3",
            crate::api::transport::HttpMethod::Put,
            "https://s3.example.com/{bucket}/{key}",
        )
        .with_invalidation("list_objects");

        exec.run(&list, json!({"bucket": "b"})).await;
        exec.run(&list, json!({"bucket": "b"})).await;
        assert_eq!(transport.calls(), 1);

        exec.run(&put, json!({"bucket": "b", "key": "k", "body": "x"})).await;
        assert_eq!(transport.calls(), 2);

        exec.run(&list, json!({"bucket": "b"})).await;
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn non_cacheable_operations_always_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let op = FnOperation::new("tick", move |_ctx: CallContext, _args: Value| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(json!(n)) }
        });
        let exec = executor(FakeTransport::replying(json!({})));
        exec.run(&op, json!({})).await;
        exec.run(&op, json!({})).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(exec.cache().is_empty());
    }

    #[tokio::test]
    async fn run_all_keeps_order() {
        let exec = executor(FakeTransport::replying(json!({})));
        let double = FnOperation::new("double", |_ctx: CallContext, n: i64| async move {
            Ok(json!(n * 2))
        })
        .with_cacheable(true);
        let op: &dyn Operation = &double;
        let results = exec
            .run_all(vec![(op, json!(1)), (op, json!(2)), (op, json!(3))])
            .await;
        let outputs: Vec<_> = results.iter().map(|r| r.output().cloned()).collect();
        assert_eq!(outputs, vec![Some(json!(2)), Some(json!(4)), Some(json!(6))]);
        assert_eq!(exec.cache().len(), 3);
    }

    #[tokio::test]
    async fn shared_cache_between_executors() {
        let cache = Arc::new(ResultCache::new());
        let transport = FakeTransport::replying(json!({"code": 1, "result": {}}));
        let a = executor(transport.clone()).with_cache(Arc::clone(&cache));
        let b = executor(transport.clone()).with_cache(Arc::clone(&cache));
        let op = token_security();
        let args = json!({"chain_id": 1, "contract_addresses": "0xabc"});
        a.run(&op, args.clone()).await;
        b.run(&op, args).await;
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn preview_counts_characters() {
        let accented = "é".repeat(120);
        assert_eq!(preview(&accented, 120), accented);
        assert_eq!(preview(&"é".repeat(121), 120), format!("{accented}..."));
        assert_eq!(preview("short", 120), "short");
    }
}
