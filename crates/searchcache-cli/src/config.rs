use anyhow::Context;
use config::Map;
use searchcache_logging::LogFormat;
use searchcache_mcp::SearchAgentConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config template created when no config exists
const DEFAULT_CONFIG: &str = r#"
[cache]
path = "~/.searchcache/cache.db"  # ":memory:" keeps nothing between runs
ttl_secs = 3600                   # Set via SEARCHCACHE_TTL_SECS env var
max_entries = 0                   # 0 = bounded by TTL only

[search]
command = ""  # e.g. "npx -y @example/web-search-mcp"
tool = "web_search"
query_argument = "query"
timeout_secs = 30
startup_timeout_secs = 10
retries = 0
retry_backoff_ms = 500

[search.env]
# SEARCH_API_KEY = ""

[logging]
level = "info"     # trace, debug, info, warn, error
format = "pretty"  # or "json"
debug = false      # Set via SEARCHCACHE_DEBUG env var
"#;

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub max_entries: u64,
}

fn default_cache_path() -> String {
    searchcache_persistence::MEMORY_PATH.to_string()
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            ttl_secs: default_ttl_secs(),
            max_entries: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub debug: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            debug: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchAgentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the global config path: ~/.searchcache/searchcache.toml
    fn global_config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".searchcache").join("searchcache.toml"))
    }

    /// Ensure global config directory and file exist, creating defaults if needed
    fn ensure_global_config() -> anyhow::Result<PathBuf> {
        let config_path = Self::global_config_path()?;

        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)?;
                eprintln!("Created config directory: {}", config_dir.display());
            }
        }

        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG.trim())?;
            eprintln!("Created default config: {}", config_path.display());
            eprintln!("Set search.command in this file before running searches.");
        }

        Ok(config_path)
    }

    /// Load configuration with layered approach:
    /// 1. Global config: ~/.searchcache/searchcache.toml (auto-created if missing)
    /// 2. Local override: ./searchcache.toml (workspace, optional)
    /// 3. Environment variables (highest priority)
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        let global_config_path = Self::ensure_global_config()?;
        Self::layered(&global_config_path, "searchcache", env::vars().collect())
    }

    /// Build the layered configuration from explicit sources
    ///
    /// `local` is a file stem resolved like `./searchcache` (any supported
    /// extension); `vars` stands in for the process environment.
    fn layered(global: &Path, local: &str, vars: Map<String, String>) -> anyhow::Result<Self> {
        let mut config_builder = config::Config::builder()
            .add_source(config::File::from(global))
            .add_source(config::File::with_name(local).required(false))
            // SEARCHCACHE__SECTION__KEY
            .add_source(
                config::Environment::with_prefix("SEARCHCACHE")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            );

        // Convenience env var overrides (highest priority)
        if let Some(ttl) = vars.get("SEARCHCACHE_TTL_SECS") {
            config_builder = config_builder.set_override("cache.ttl_secs", ttl.as_str())?;
        }

        if let Some(path) = vars.get("SEARCHCACHE_CACHE_PATH") {
            config_builder = config_builder.set_override("cache.path", path.as_str())?;
        }

        if let Some(debug) = vars.get("SEARCHCACHE_DEBUG") {
            config_builder = config_builder.set_override("logging.debug", debug.as_str())?;
        }

        let config: Self = config_builder
            .build()?
            .try_deserialize()
            .context("Invalid searchcache configuration")?;
        Ok(config)
    }

    /// Parse configuration from TOML text alone
    #[cfg(test)]
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Cache path with a leading `~` expanded to the home directory
    pub fn cache_path(&self) -> String {
        let path = self.cache.path.trim();
        match (path.strip_prefix('~'), dirs::home_dir()) {
            (Some(rest), Some(home)) => {
                format!("{}{}", home.display(), rest)
            }
            _ => path.to_string(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn log_level(&self) -> &str {
        searchcache_logging::effective_level(&self.logging.level, self.logging.debug)
    }

    pub fn log_format(&self) -> anyhow::Result<LogFormat> {
        self.logging.format.parse()
    }
}
