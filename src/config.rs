//! Configuration (`SPEC_FULL.md` §1.3): four-tier precedence — CLI > env >
//! TOML file > built-in defaults — following the teacher's `Config::load()`.

use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub locking: LockingConfig,
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub roots: RootsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,ace_core=debug".to_string(), file: None }
    }
}

/// Backs the `ACE_API_KEY` bearer check (§6). There is no user/role model —
/// one shared key, unlike the teacher's JWT/Casbin stack.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { api_key: "dev-api-key-change-in-production".to_string() }
    }
}

/// Backs `ACE_STORAGE_ROOT`, the content-addressed blob store's base
/// directory (§4.8).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: "data/blobs".to_string() }
    }
}

/// Defaults for §4.5 lock acquisitions when a caller doesn't specify one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockingConfig {
    pub default_wait_secs: u64,
    pub default_lease_secs: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self { default_wait_secs: 10, default_lease_secs: 30 }
    }
}

/// Default for §4.4 `WorkQueue::get`'s visibility timeout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub default_visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { default_visibility_timeout_secs: 60 }
    }
}

/// `None` disables caching for AMTs that don't specify their own
/// `cache_ttl_secs` (§4.6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { default_ttl_secs: None }
    }
}

/// `None` disables TTL-based root expiration (§3 lifecycle note,
/// `SPEC_FULL.md` §5).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RootsConfig {
    pub ttl_secs: Option<u64>,
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self { ttl_secs: None }
    }
}

/// Command line argument overrides.
#[derive(Parser, Debug, Clone)]
#[command(name = "aced")]
#[command(version, about = "ACE Core — recursive pluggable analysis orchestration engine")]
pub struct CommandLineArgs {
    /// Path to a configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Bind host (overrides config file/env, maps to `ACE_URI`'s host part).
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Bind port (overrides config file/env, maps to `ACE_URI`'s port part).
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Bearer API key (overrides config file/env).
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Blob storage root directory (overrides config file/env).
    #[arg(long, value_name = "PATH")]
    pub storage_root: Option<String>,

    /// Logging level (overrides config file/env, e.g. "info,ace_core=debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Config {
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (`ACE_*`, per §6)
    /// 3. Configuration file (TOML)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Environment variables consumed, per §6: `ACE_URI`, `ACE_API_KEY`,
    /// `ACE_STORAGE_ROOT`, `ACE_DB_URL` (accepted and stored, not yet wired
    /// to a SQL backend), `ACE_BASE_DIR`. `ACE_ADMIN_PASSWORD`,
    /// `ACE_REDIS_HOST`/`PORT`, `ACE_CRYPTO_*`, `ACE_PACKAGE_URI` are out of
    /// scope (packaging CLI, auth-key issuance) and are not read.
    fn apply_env_overrides(&mut self) {
        if let Ok(uri) = std::env::var("ACE_URI") {
            if let Some((host, port)) = uri.rsplit_once(':') {
                if let Ok(port) = port.parse() {
                    self.server.host = host.to_string();
                    self.server.port = port;
                    tracing::info!("Override server bind address from ACE_URI: {}", uri);
                }
            }
        }

        if let Ok(key) = std::env::var("ACE_API_KEY") {
            self.auth.api_key = key;
            tracing::info!("Override auth.api_key from ACE_API_KEY");
        }

        if let Ok(root) = std::env::var("ACE_STORAGE_ROOT") {
            self.storage.root = root;
            tracing::info!("Override storage.root from ACE_STORAGE_ROOT: {}", self.storage.root);
        }

        // Accepted and stored for a future SQL-backed implementation; this
        // workspace's in-memory subsystems never read it (§9 open question b).
        let _db_url = std::env::var("ACE_DB_URL").ok();

        if let Ok(base_dir) = std::env::var("ACE_BASE_DIR") {
            tracing::info!("ACE_BASE_DIR set: {}", base_dir);
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }
        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }
        if let Some(key) = &args.api_key {
            self.auth.api_key = key.clone();
            tracing::info!("Override auth.api_key from CLI");
        }
        if let Some(root) = &args.storage_root {
            self.storage.root = root.clone();
            tracing::info!("Override storage.root from CLI: {}", self.storage.root);
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.auth.api_key == "dev-api-key-change-in-production" {
            tracing::warn!("Using the default API key — set ACE_API_KEY for anything but local dev");
        }
        if self.server.port == 0 {
            anyhow::bail!("server.port cannot be 0");
        }
        if self.storage.root.is_empty() {
            anyhow::bail!("storage.root cannot be empty");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths = ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];
        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
