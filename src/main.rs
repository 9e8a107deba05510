//! # Scoped Search CLI (`scoped-search`)
//!
//! Runs the MCP tool server, or a single tool from the command line.
//!
//! ## Usage
//!
//! ```bash
//! scoped-search [--config ./scoped-search.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve [stdio]` | MCP server over stdin/stdout |
//! | `serve http` | HTTP server: `/mcp`, `/tools/*`, `/health` |
//! | `compose` | Print the permission-scoped query without running it |
//! | `search` | Run one scoped search and print the fragments |
//! | `indices <pattern>` | List indices |
//! | `mappings <index>` | Show an index's mappings |
//! | `shards [index]` | Show shard allocation |
//!
//! Logs go to stderr; set `RUST_LOG` to override `[logging] level`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use scoped_search::cache::RedisScopeStore;
use scoped_search::config::{load_config, Config};
use scoped_search::engine::ElasticsearchClient;
use scoped_search::gateway::{ScopePolicy, ScopedSearch};
use scoped_search::server;
use scoped_search::tools::{ToolContext, ToolRegistry};

/// Permission-aware Elasticsearch tools for MCP clients.
///
/// Settings come from an optional TOML file overlaid with `ES_*` and
/// `REDIS_*` environment variables.
#[derive(Parser)]
#[command(name = "scoped-search", version)]
struct Cli {
    /// Path to configuration file (TOML). Environment variables alone
    /// are enough when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server.
    Serve {
        #[command(subcommand)]
        transport: Option<Transport>,
    },

    /// Print the permission-scoped query for a caller without searching.
    Compose {
        #[command(flatten)]
        request: SearchArgs,
    },

    /// Run one permission-scoped search and print the result fragments.
    Search {
        #[command(flatten)]
        request: SearchArgs,
    },

    /// List indices matching a pattern.
    Indices {
        /// Index pattern, e.g. `cdc_*`.
        pattern: String,
    },

    /// Show the field mappings of an index.
    Mappings { index: String },

    /// Show shard allocation, optionally for one index.
    Shards { index: Option<String> },
}

#[derive(Subcommand)]
enum Transport {
    /// MCP over stdin/stdout.
    Stdio,
    /// HTTP on `[server].bind`.
    Http {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Target index.
    #[arg(long)]
    index: String,

    /// Caller whose permission scope applies.
    #[arg(long)]
    user: String,

    /// Query DSL body as JSON.
    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Read the query DSL body from a file.
    #[arg(long)]
    body_file: Option<PathBuf>,
}

impl SearchArgs {
    fn query_body(&self) -> Result<Map<String, Value>> {
        let raw = match (&self.body, &self.body_file) {
            (Some(body), _) => body.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read query body: {}", path.display()))?,
            (None, None) => return Ok(Map::new()),
        };
        match serde_json::from_str(&raw).with_context(|| "Query body is not valid JSON")? {
            Value::Object(map) => Ok(map),
            _ => bail!("queryBody must be a valid Elasticsearch query DSL object"),
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(config: &Config) -> Result<Arc<ScopedSearch>> {
    let engine = ElasticsearchClient::new(&config.elasticsearch)?;
    let scopes = RedisScopeStore::connect(&config.cache).await?;
    Ok(Arc::new(ScopedSearch::new(
        Arc::new(scopes),
        Arc::new(engine),
        ScopePolicy::from_config(config),
    )))
}

async fn run_tool(config: &Config, name: &str, params: Value) -> Result<()> {
    let ctx = ToolContext::new(connect(config).await?);
    let output = ToolRegistry::with_builtins().call(name, params, &ctx).await?;
    println!("{}", output.text());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config);

    match cli.command {
        Commands::Serve { transport } => {
            let ctx = ToolContext::new(connect(&config).await?);
            let tools = Arc::new(ToolRegistry::with_builtins());
            match transport.unwrap_or(Transport::Stdio) {
                Transport::Stdio => server::run_stdio(tools, ctx).await?,
                Transport::Http { bind } => {
                    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
                    server::run_http(&bind, tools, ctx).await?;
                }
            }
        }
        Commands::Compose { request } => {
            let body = request.query_body()?;
            let search = connect(&config).await?;
            let composed = search.compose(&request.index, &body, &request.user).await?;
            println!("{}", serde_json::to_string_pretty(&composed)?);
        }
        Commands::Search { request } => {
            let body = request.query_body()?;
            let params = json!({
                "index": request.index,
                "userId": request.user,
                "queryBody": body,
            });
            run_tool(&config, "search", params).await?;
        }
        Commands::Indices { pattern } => {
            run_tool(&config, "list_indices", json!({ "indexPattern": pattern })).await?;
        }
        Commands::Mappings { index } => {
            run_tool(&config, "get_mappings", json!({ "index": index })).await?;
        }
        Commands::Shards { index } => {
            let params = match index {
                Some(index) => json!({ "index": index }),
                None => json!({}),
            };
            run_tool(&config, "get_shards", params).await?;
        }
    }

    Ok(())
}
