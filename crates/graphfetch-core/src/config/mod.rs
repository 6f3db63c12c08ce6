//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::graph::Namespace;

/// Upper bound for any single traversal depth
pub const MAX_DEPTH: usize = 5;

/// Upper bound for the number of subjects in one store query
pub const MAX_BATCH_SIZE: usize = 100;

/// Upper bound for the bounded-parallel worker pool
pub const MAX_POOL_SIZE: usize = 16;

/// Graphfetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub graph: GraphConfig,
    pub traversal: TraversalConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Prefix bound to the namespace, e.g. `odis`
    pub prefix: String,
    /// IRI prefix of every traversable entity
    pub namespace: String,
    /// Preferred literal language
    pub language: String,
    /// Type local name to IRI path segment, e.g. `Archief = "archieven"`
    #[serde(default)]
    pub collections: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    pub per_entity_depth: usize,
    pub max_total_depth: usize,
    pub batch_size: usize,
    pub pool_size: usize,
    pub batch_timeout_secs: u64,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    pub ttl_secs: u64,
}

/// How the frontier of a traversal is expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Entity queue, each entity expanded level by level
    Level,
    /// Global BFS, one batch query at a time
    Sequential,
    /// Global BFS, batches fanned out over a bounded worker pool
    Parallel,
    /// A single N-hop CONSTRUCT query
    Construct,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Level,
        Strategy::Sequential,
        Strategy::Parallel,
        Strategy::Construct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Level => "level",
            Strategy::Sequential => "sequential",
            Strategy::Parallel => "parallel",
            Strategy::Construct => "construct",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| {
                anyhow!(
                    "Invalid strategy: {}. Valid options: level, sequential, parallel, construct",
                    s
                )
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                endpoint: "http://localhost:8890/sparql".to_string(),
                timeout_secs: 30,
                format: "application/ld+json".to_string(),
            },
            graph: GraphConfig {
                prefix: "odis".to_string(),
                namespace: "https://data.odis.be/".to_string(),
                language: "nl".to_string(),
                collections: BTreeMap::new(),
            },
            traversal: TraversalConfig {
                per_entity_depth: 2,
                max_total_depth: 10,
                batch_size: 50,
                pool_size: 4,
                batch_timeout_secs: 30,
                strategy: Strategy::Parallel,
            },
            cache: CacheConfig {
                enabled: true,
                dir: None,
                ttl_secs: 86_400,
            },
        }
    }
}

impl StoreConfig {
    /// Endpoint, honouring the `GRAPHFETCH_ENDPOINT` override
    pub fn resolved_endpoint(&self) -> String {
        env::var("GRAPHFETCH_ENDPOINT").unwrap_or_else(|_| self.endpoint.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GraphConfig {
    /// Build the namespace/prefix table used by queries and the embedder
    pub fn namespace(&self) -> Namespace {
        Namespace::new(&self.prefix, &self.namespace).with_collections(self.collections.clone())
    }
}

impl TraversalConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    /// Batch size clamped to what a single query may carry
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Pool size clamped to a small constant
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.clamp(1, MAX_POOL_SIZE)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Directory of the file cache: `dir`, or `cache` under the config directory
    pub fn resolved_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Config::config_dir()?.join("cache")),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("GRAPHFETCH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("graphfetch")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store.endpoint.trim().is_empty() {
            return Err(anyhow!("store.endpoint must not be empty"));
        }
        if !self.graph.namespace.starts_with("http") {
            return Err(anyhow!(
                "graph.namespace must be an absolute IRI, got '{}'",
                self.graph.namespace
            ));
        }
        if self.graph.prefix.is_empty() || self.graph.prefix.contains(':') {
            return Err(anyhow!("graph.prefix must be a non-empty name without ':'"));
        }
        if self.traversal.batch_size == 0 || self.traversal.batch_size > MAX_BATCH_SIZE {
            return Err(anyhow!(
                "traversal.batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            ));
        }
        if self.traversal.pool_size == 0 || self.traversal.pool_size > MAX_POOL_SIZE {
            return Err(anyhow!(
                "traversal.pool_size must be between 1 and {}",
                MAX_POOL_SIZE
            ));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "store.endpoint" => Ok(self.store.endpoint.clone()),
            "store.timeout_secs" => Ok(self.store.timeout_secs.to_string()),
            "store.format" => Ok(self.store.format.clone()),

            "graph.prefix" => Ok(self.graph.prefix.clone()),
            "graph.namespace" => Ok(self.graph.namespace.clone()),
            "graph.language" => Ok(self.graph.language.clone()),
            "graph.collections" => Ok(self
                .graph
                .collections
                .iter()
                .map(|(ty, segment)| format!("{}={}", ty, segment))
                .collect::<Vec<_>>()
                .join(", ")),

            "traversal.per_entity_depth" => Ok(self.traversal.per_entity_depth.to_string()),
            "traversal.max_total_depth" => Ok(self.traversal.max_total_depth.to_string()),
            "traversal.batch_size" => Ok(self.traversal.batch_size.to_string()),
            "traversal.pool_size" => Ok(self.traversal.pool_size.to_string()),
            "traversal.batch_timeout_secs" => Ok(self.traversal.batch_timeout_secs.to_string()),
            "traversal.strategy" => Ok(self.traversal.strategy.to_string()),

            "cache.enabled" => Ok(self.cache.enabled.to_string()),
            "cache.dir" => Ok(self.cache.resolved_dir()?.display().to_string()),
            "cache.ttl_secs" => Ok(self.cache.ttl_secs.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `graphfetch config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "store.endpoint" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Endpoint must not be empty"));
                }
                self.store.endpoint = value.to_string();
            }
            "store.timeout_secs" => {
                self.store.timeout_secs = parse_number(key, value)?;
            }
            "store.format" => {
                self.store.format = value.to_string();
            }

            "graph.prefix" => {
                if value.is_empty() || value.contains(':') {
                    return Err(anyhow!("Prefix must be a non-empty name without ':'"));
                }
                self.graph.prefix = value.to_string();
            }
            "graph.namespace" => {
                if !value.starts_with("http") {
                    return Err(anyhow!("Namespace must be an absolute IRI"));
                }
                self.graph.namespace = value.to_string();
            }
            "graph.language" => {
                self.graph.language = value.to_string();
            }
            "graph.collections" => {
                self.graph.collections = parse_collections(value)?;
            }

            "traversal.per_entity_depth" => {
                let depth: usize = parse_number(key, value)?;
                if depth > MAX_DEPTH {
                    return Err(anyhow!("Per-entity depth must be at most {}", MAX_DEPTH));
                }
                self.traversal.per_entity_depth = depth;
            }
            "traversal.max_total_depth" => {
                self.traversal.max_total_depth = parse_number(key, value)?;
            }
            "traversal.batch_size" => {
                let size: usize = parse_number(key, value)?;
                if !(1..=MAX_BATCH_SIZE).contains(&size) {
                    return Err(anyhow!("Batch size must be between 1 and {}", MAX_BATCH_SIZE));
                }
                self.traversal.batch_size = size;
            }
            "traversal.pool_size" => {
                let size: usize = parse_number(key, value)?;
                if !(1..=MAX_POOL_SIZE).contains(&size) {
                    return Err(anyhow!("Pool size must be between 1 and {}", MAX_POOL_SIZE));
                }
                self.traversal.pool_size = size;
            }
            "traversal.batch_timeout_secs" => {
                self.traversal.batch_timeout_secs = parse_number(key, value)?;
            }
            "traversal.strategy" => {
                self.traversal.strategy = value.parse()?;
            }

            "cache.enabled" => {
                self.cache.enabled = value
                    .parse()
                    .with_context(|| format!("Invalid cache.enabled value: {}", value))?;
            }
            "cache.dir" => {
                self.cache.dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "cache.ttl_secs" => {
                self.cache.ttl_secs = parse_number(key, value)?;
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `graphfetch config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "store.endpoint",
            "store.timeout_secs",
            "store.format",
            "graph.prefix",
            "graph.namespace",
            "graph.language",
            "graph.collections",
            "traversal.per_entity_depth",
            "traversal.max_total_depth",
            "traversal.batch_size",
            "traversal.pool_size",
            "traversal.batch_timeout_secs",
            "traversal.strategy",
            "cache.enabled",
            "cache.dir",
            "cache.ttl_secs",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_number<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))
}

/// Parse `Type=segment, Other=segments`
fn parse_collections(value: &str) -> anyhow::Result<BTreeMap<String, String>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (ty, segment) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid collection mapping '{}', expected Type=segment", pair))?;
            Ok((ty.trim().to_string(), segment.trim().to_string()))
        })
        .collect()
}
