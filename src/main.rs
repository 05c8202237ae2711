//! tiercache CLI
//!
//! Runs single cache operations against a configured memcached cluster, for
//! checking connectivity and inspecting values.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          tiercache                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │ FileConfig   │───▶│ CacheService │───▶│ Memcache     │       │
//! │  │ Provider     │    │ TieredCache  │    │ Cluster      │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             ▼                                    │
//! │                QueryLog │ TracingSink │ PrometheusSink           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tiercache::adapters::{
    CompositeSink, FileConfigProvider, PrometheusSink, QueryLog, TracingSink,
};
use tiercache::cache::{CacheService, ServerConfig};
use tiercache::domain::CACHE_CATEGORY;

// =============================================================================
// CLI Arguments
// =============================================================================

/// tiercache - two-tier cache client for memcached clusters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file with a `cache:` section
    #[arg(long, short, env = "TIERCACHE_CONFIG", default_value = "tiercache.yaml")]
    config: PathBuf,

    /// Servers to use instead of the config file's list (host[:port[:weight]])
    #[arg(long, env = "TIERCACHE_SERVERS", value_delimiter = ',', value_parser = parse_server)]
    servers: Vec<ServerConfig>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Print the cache query log after the command
    #[arg(long)]
    verbose_queries: bool,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one key
    Get {
        key: String,
        /// Skip the local tier
        #[arg(long)]
        no_local: bool,
    },
    /// Fetch several keys in one batch
    Mget {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Store a value (JSON, or a bare string)
    Set {
        key: String,
        value: String,
        /// Time to live in seconds (default from config)
        #[arg(long)]
        ttl: Option<u64>,
        /// Also store in the local tier
        #[arg(long)]
        local: bool,
    },
    /// Remove a key
    Delete { key: String },
    /// Show per-server statistics
    Stats,
}

fn parse_server(s: &str) -> std::result::Result<ServerConfig, String> {
    s.parse().map_err(|e: tiercache::Error| e.to_string())
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let mut provider = FileConfigProvider::new(&args.config);
    if !args.servers.is_empty() {
        provider = provider.with_servers(args.servers.clone());
    }

    let query_log = Arc::new(QueryLog::new());
    if args.verbose_queries {
        query_log.enable(CACHE_CATEGORY)?;
    }
    let prometheus = Arc::new(PrometheusSink::new()?);
    let sink = CompositeSink::new()
        .with_sink(Arc::new(TracingSink::new()))
        .with_sink(query_log.clone())
        .with_sink(prometheus.clone());

    let service = Arc::new(CacheService::new(Arc::new(provider), Arc::new(sink)));
    service
        .init()
        .await
        .with_context(|| format!("cannot configure cache from {}", args.config.display()))?;

    let code = run(&service, args.command).await?;

    if args.verbose_queries {
        for query in query_log.last_queries(CACHE_CATEGORY, None)? {
            eprintln!(
                "[{}] {} ({:.6}s)",
                query.category,
                query.description,
                query.duration.as_secs_f64()
            );
        }
    }
    if args.metrics {
        print!("{}", prometheus.gather_text()?);
    }

    Ok(code)
}

async fn run(service: &Arc<CacheService>, command: Command) -> anyhow::Result<ExitCode> {
    let mut cache = service.cache();

    match command {
        Command::Get { key, no_local } => {
            match cache.get::<serde_json::Value>(&key, !no_local).await? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => {
                    eprintln!("{key}: not found");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Mget { keys } => {
            let found = cache.get_many::<_, serde_json::Value>(&keys, true).await?;
            // Requested order, found keys only
            let ordered: serde_json::Map<String, serde_json::Value> = keys
                .iter()
                .filter_map(|key| found.get(key).map(|value| (key.clone(), value.clone())))
                .collect();
            println!("{}", serde_json::to_string_pretty(&ordered)?);
            debug!("{} of {} keys found", found.len(), keys.len());
        }
        Command::Set {
            key,
            value,
            ttl,
            local,
        } => {
            let value = serde_json::from_str::<serde_json::Value>(&value)
                .unwrap_or(serde_json::Value::String(value));
            let stored = cache
                .set(&key, &value, ttl.map(Duration::from_secs), local)
                .await?;
            if !stored {
                eprintln!("{key}: not stored");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Delete { key } => {
            if !cache.delete(&key, true).await? {
                eprintln!("{key}: not deleted");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Stats => {
            let stats = cache.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so command output stays clean on stdout
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
