use crate::aggregation::DEFAULT_OUTSTANDING_CUTOFF_DAYS;
use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[database] path`
pub const DATABASE_ENV: &str = "PARTNER_UNIFY_DB";

/// Config file looked up next to the executable
pub const CONFIG_FILE_NAME: &str = "partner-unify.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queries: QueryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where this configuration came from
    #[serde(skip)]
    pub source: ConfigSource,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: "target/db/partners.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct QueryConfig {
    pub outstanding_cutoff_days: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            outstanding_cutoff_days: DEFAULT_OUTSTANDING_CUTOFF_DAYS,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    #[default]
    Embedded,
    File(PathBuf),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Embedded => f.write_str("embedded default"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[database]
path = "target/db/partners.db"

[queries]
outstanding_cutoff_days = 10

[logging]
filter = "info"
"#;

impl Config {
    pub fn embedded() -> Result<Config> {
        Ok(toml::from_str(DEFAULT_CONFIG)?)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.source = ConfigSource::File(path.to_path_buf());
        Ok(config)
    }

    /// Database file, `PARTNER_UNIFY_DB` first
    pub fn database_path(&self) -> PathBuf {
        self.database_path_with(std::env::var(DATABASE_ENV).ok())
    }

    fn database_path_with(&self, env_override: Option<String>) -> PathBuf {
        match env_override.filter(|p| !p.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.database.path),
        }
    }
}

/// Load configuration
///
/// Search order:
/// 1. Explicit path (`--config`); a missing file is an error
/// 2. partner-unify.toml next to the executable
/// 3. Falls back to embedded default config
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::from_file(path);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Config::from_file(&config_path);
            }
        }
    }

    Config::embedded()
}
