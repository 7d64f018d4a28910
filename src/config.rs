use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for ticket-flow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TicketFlowConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Rule cache settings
    pub cache: CacheConfig,
    /// Where the workflow definition comes from
    pub workflow: WorkflowConfig,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level, used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Upper bound on how long a change made by another process can go unseen
    pub ttl_seconds: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 5,
            max_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// TOML workflow definition; the built-in repair workflow is used when unset
    pub definition_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: ".ticket-flow/ticket-flow.db".to_string(),
            max_connections: 10,
            auto_migrate: true,
        }
    }
}

impl Default for TicketFlowConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "warn".to_string(),
                json_logs: false,
            },
            cache: CacheConfig::default(),
            workflow: WorkflowConfig::default(),
            database: None,
        }
    }
}

impl TicketFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (ticket-flow.toml, .ticket-flow-rc)
    /// 3. Environment variables (prefixed with TICKET_FLOW_, `__` between
    ///    section and key, e.g. TICKET_FLOW_CACHE__TTL_SECONDS)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) with configuration files looked up in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_file = dir.join("ticket-flow.toml");
        if toml_file.exists() {
            builder = builder.add_source(File::from(toml_file));
        }

        let rc_file = dir.join(".ticket-flow-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("TICKET_FLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<TicketFlowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = TicketFlowConfig::load_env_file();
        TicketFlowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static TicketFlowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
