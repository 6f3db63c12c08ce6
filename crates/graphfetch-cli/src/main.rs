//! Graphfetch CLI - linked entities from a triple store as nested documents

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use graphfetch_core::config::{Config, Strategy};
use graphfetch_core::fetch::GraphFetcher;
use graphfetch_core::ids::{normalize_ids, validate_entity_type};
use graphfetch_core::query::QueryBuilder;
use graphfetch_core::store::MemoryStore;
use serde_json::json;
use tracing::debug;

#[derive(Parser)]
#[command(name = "graphfetch")]
#[command(author, version, about = "Fetch linked entities from a triple store as nested documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch entities and their related graph
    Fetch {
        /// Full IRIs, short ids, or comma-separated lists of either
        #[arg(required = true)]
        ids: Vec<String>,
        /// Entity type of the roots, e.g. odis:Archief
        #[arg(short = 't', long = "type")]
        entity_type: String,
        /// Per-entity depth (defaults to traversal.per_entity_depth)
        #[arg(short, long)]
        depth: Option<usize>,
        /// Total depth cutoff (defaults to traversal.max_total_depth)
        #[arg(long)]
        total_depth: Option<usize>,
        /// Literal language (defaults to graph.language)
        #[arg(short, long)]
        language: Option<String>,
        /// Traversal strategy: level, sequential, parallel or construct
        #[arg(short, long)]
        strategy: Option<Strategy>,
        /// Skip the result cache lookup
        #[arg(long)]
        no_cache: bool,
        /// Print traversal statistics with the result
        #[arg(long)]
        stats: bool,
        /// Serve the graph from a JSON-LD file instead of the endpoint
        #[arg(long)]
        fixture: Option<PathBuf>,
    },

    /// Print the neighborhood CONSTRUCT query without contacting the store
    Query {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(short = 't', long = "type")]
        entity_type: String,
        #[arg(short, long)]
        depth: Option<usize>,
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

struct FetchArgs {
    ids: Vec<String>,
    entity_type: String,
    depth: Option<usize>,
    total_depth: Option<usize>,
    language: Option<String>,
    strategy: Option<Strategy>,
    no_cache: bool,
    stats: bool,
    fixture: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let directive = if cli.verbose {
        "graphfetch=debug"
    } else {
        "graphfetch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch {
            ids,
            entity_type,
            depth,
            total_depth,
            language,
            strategy,
            no_cache,
            stats,
            fixture,
        } => {
            cmd_fetch(FetchArgs {
                ids,
                entity_type,
                depth,
                total_depth,
                language,
                strategy,
                no_cache,
                stats,
                fixture,
            })
            .await
        }

        Commands::Query {
            ids,
            entity_type,
            depth,
            language,
        } => cmd_query(&ids, &entity_type, depth, language.as_deref()),

        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_fetch(args: FetchArgs) -> anyhow::Result<()> {
    let config = Config::load()?;

    let fetcher = match &args.fixture {
        Some(path) => fixture_fetcher(path, config)?,
        None => GraphFetcher::from_config(config).map_err(report)?,
    };
    debug!(fetcher = ?fetcher, "Fetcher ready");

    let mut options = fetcher
        .options(args.ids, args.entity_type)
        .bypass_cache(args.no_cache);
    if let Some(depth) = args.depth {
        options = options.depth(depth);
    }
    if let Some(total_depth) = args.total_depth {
        options = options.max_total_depth(total_depth);
    }
    if let Some(language) = args.language {
        options = options.language(language);
    }
    if let Some(strategy) = args.strategy {
        options = options.strategy(strategy);
    }

    let outcome = fetcher.fetch(&options).await.map_err(report)?;

    let output = if args.stats {
        let stats = outcome.stats.clone();
        let type_hints = outcome.type_hints.clone();
        json!({
            "result": outcome.into_document(),
            "stats": stats,
            "type_hints": type_hints,
        })
    } else {
        outcome.into_document()
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Fixture data is served from memory and never cached
fn fixture_fetcher(path: &Path, config: Config) -> anyhow::Result<GraphFetcher> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
    let store = MemoryStore::from_json_ld(&body, config.graph.namespace()).map_err(report)?;
    debug!(nodes = store.len(), fixture = %path.display(), "Loaded fixture");
    Ok(GraphFetcher::new(Arc::new(store), config))
}

fn cmd_query(
    ids: &[String],
    entity_type: &str,
    depth: Option<usize>,
    language: Option<&str>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let namespace = config.graph.namespace();

    validate_entity_type(entity_type).map_err(report)?;
    let roots = normalize_ids(ids, entity_type, &namespace).map_err(report)?;
    let depth = depth.unwrap_or(config.traversal.per_entity_depth);
    let language = language.unwrap_or(&config.graph.language);

    let query = QueryBuilder::new(namespace).neighborhood(&roots, entity_type, depth, language);
    print!("{}", query);
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Attach the error code and a suggested next step
fn report(error: graphfetch_core::Error) -> anyhow::Error {
    match error.suggestion() {
        Some(suggestion) => anyhow::anyhow!("[{}] {}\n  Try: {}", error.code(), error, suggestion),
        None => anyhow::anyhow!("[{}] {}", error.code(), error),
    }
}
