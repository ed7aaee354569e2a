//! Issue one cached provider call and print the `ToolResult` as JSON.
//!
//! Cache, timeout and retry defaults come from the `TOOLKIT_*` environment
//! variables; flags override them.
//!
//! # Examples
//!
//! ```sh
//! # GoPlus token security, API key from $GOPLUS_API_KEY
//! toolkit --name token_security --provider goplus \
//!   --url 'https://api.gopluslabs.io/api/v1/token_security/{chain_id}' \
//!   --arg chain_id=1 --arg contract_addresses=0xdac17f958d2ee523a2206206994597c13d831ec7 \
//!   --credential-env GOPLUS_API_KEY --auth-prefix 'Bearer ' --payload-field result
//!
//! # Repeat to watch the second call come from cache
//! toolkit --url https://api.example.com/price --arg symbol=BTC --repeat 2 -v
//!
//! # Key in the query string, retry transient failures
//! toolkit --url https://api.example.com/quote --credential-env QUOTE_KEY \
//!   --auth-query apikey --retries 3
//! ```

use clap::{Parser, ValueEnum};
use serde_json::{Map, Value};
use spoon_toolkit::api::{HttpMethod, retry_with_backoff};
use spoon_toolkit::config::ToolkitConfig;
use spoon_toolkit::result::{ErrorConvention, ToolError, ToolResult};
use spoon_toolkit::tools::HttpOperation;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Issue one cached provider call and print the result envelope.
#[derive(Parser)]
#[command(name = "toolkit")]
struct Cli {
    // ── Operation ──────────────────────────────────────────────
    /// Operation name, used as the cache key prefix
    #[arg(long, default_value = "call")]
    name: String,

    /// Provider label for messages and metadata
    #[arg(long, default_value = "http")]
    provider: String,

    /// URL template; `{arg}` placeholders are filled from --arg
    #[arg(long)]
    url: String,

    /// HTTP method
    #[arg(long, value_enum, default_value_t = Method::Get)]
    method: Method,

    /// Argument as key=value; values that parse as JSON are sent as JSON
    #[arg(long = "arg", value_parser = parse_key_value)]
    args: Vec<(String, Value)>,

    // ── Credentials ────────────────────────────────────────────
    /// Environment variable holding the API key
    #[arg(long)]
    credential_env: Option<String>,

    /// Header carrying the API key
    #[arg(long, default_value = "Authorization")]
    auth_header: String,

    /// Prefix for the header value (e.g. "Bearer ")
    #[arg(long)]
    auth_prefix: Option<String>,

    /// Send the API key as this query parameter instead of a header
    #[arg(long)]
    auth_query: Option<String>,

    // ── Classification ─────────────────────────────────────────
    /// Body field holding the provider status code ("" disables)
    #[arg(long)]
    code_field: Option<String>,

    /// Body field unwrapped as the output on success
    #[arg(long)]
    payload_field: Option<String>,

    // ── Cache and timing ───────────────────────────────────────
    /// Success TTL in seconds (overrides TOOLKIT_CACHE_TTL_SECS)
    #[arg(long)]
    ttl: Option<u64>,

    /// Request timeout in seconds (overrides TOOLKIT_HTTP_TIMEOUT_SECS)
    #[arg(long)]
    timeout: Option<u64>,

    /// Issue the call this many times
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Retries for transient failures (overrides TOOLKIT_MAX_RETRIES)
    #[arg(long)]
    retries: Option<u32>,

    /// Debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl From<Method> for HttpMethod {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => HttpMethod::Get,
            Method::Post => HttpMethod::Post,
            Method::Put => HttpMethod::Put,
            Method::Delete => HttpMethod::Delete,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "spoon_toolkit=debug,toolkit=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_config(cli: &Cli) -> Result<ToolkitConfig, ToolError> {
    let mut config = ToolkitConfig::from_env()?;
    if let Some(ttl) = cli.ttl {
        config = config.with_cache_ttl(Duration::from_secs(ttl));
    }
    if let Some(timeout) = cli.timeout {
        if timeout == 0 {
            return Err(ToolError::invalid_config("--timeout", "must be at least 1 second"));
        }
        config = config.with_http_timeout(Duration::from_secs(timeout));
    }
    if let Some(retries) = cli.retries {
        config.retry.max_retries = retries;
    }
    Ok(config)
}

fn build_operation(cli: &Cli) -> HttpOperation {
    let mut convention = match cli.code_field.as_deref() {
        Some("") => ErrorConvention::without_codes(),
        Some(field) => ErrorConvention::default().code_field(field),
        None => ErrorConvention::default(),
    };
    if let Some(field) = &cli.payload_field {
        convention = convention.payload_field(field);
    }

    let op = HttpOperation::new(&cli.name, &cli.provider, cli.method.into(), &cli.url)
        .convention(convention);
    match (&cli.credential_env, &cli.auth_query) {
        (Some(cred), Some(param)) => op.auth_query(cred, param),
        (Some(cred), None) => op.auth_header(cred, &cli.auth_header, cli.auth_prefix.as_deref()),
        (None, _) => op,
    }
}

async fn run(cli: &Cli) -> Result<ToolResult, ToolError> {
    let config = build_config(cli)?;
    let transport = Arc::new(config.build_transport()?);
    let executor = config.build_executor(transport);
    let _sweeper = config.spawn_sweeper(executor.cache());

    let op = build_operation(cli);
    let args = Value::Object(cli.args.iter().cloned().collect::<Map<_, _>>());

    let call = || executor.run(&op, args.clone());
    let mut result = retry_with_backoff(&config.retry, call).await;
    for _ in 1..cli.repeat {
        result = retry_with_backoff(&config.retry, call).await;
    }

    let stats = executor.cache().stats();
    info!(
        "cache: {} hit(s), {} miss(es), {} entr{}",
        stats.hits,
        stats.misses,
        stats.entries,
        if stats.entries == 1 { "y" } else { "ies" }
    );
    Ok(result)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(result) => {
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{json}"),
                Err(_) => println!("{result}"),
            }
            if !result.is_success() {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e.describe());
            process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_value_parses_json_values() {
        assert_eq!(parse_key_value("chain_id=1").unwrap(), ("chain_id".into(), json!(1)));
        assert_eq!(
            parse_key_value("ids=[1,2]").unwrap(),
            ("ids".into(), json!([1, 2]))
        );
    }

    #[test]
    fn key_value_falls_back_to_string() {
        assert_eq!(
            parse_key_value("address=0xABC").unwrap(),
            ("address".into(), json!("0xABC"))
        );
        assert_eq!(parse_key_value("q=a=b").unwrap(), ("q".into(), json!("a=b")));
        assert_eq!(parse_key_value("empty=").unwrap(), ("empty".into(), json!("")));
    }

    #[test]
    fn key_value_rejects_malformed() {
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=1").is_err());
    }

    #[test]
    fn cli_builds_header_auth_operation() {
        let cli = Cli::parse_from([
            "toolkit",
            "--url",
            "https://api.example.com/{chain_id}",
            "--credential-env",
            "KEY",
            "--auth-prefix",
            "Bearer ",
            "--arg",
            "chain_id=1",
        ]);
        use spoon_toolkit::tools::Operation;
        let op = build_operation(&cli);
        assert_eq!(op.name(), "call");
        assert_eq!(op.required_credentials(), vec!["KEY".to_string()]);
        assert!(op.cacheable());
    }

    #[test]
    fn post_is_not_cacheable() {
        let cli = Cli::parse_from(["toolkit", "--url", "https://x", "--method", "post"]);
        use spoon_toolkit::tools::Operation;
        assert!(!build_operation(&cli).cacheable());
    }
}
