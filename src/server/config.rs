use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("DATABASE_URL is required")]
    MissingDatabaseUrl,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    listen_address: Option<String>,
    log_dir: Option<String>,
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, ServerConfigError> {
        dotenv::dotenv().ok();
        Self::load_with_env(config_path, std::env::vars())
    }

    /// File first, then environment variables on top.
    pub fn load_with_env<I>(config_path: Option<&str>, vars: I) -> Result<Self, ServerConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let file_config = match config_path {
            Some(path_str) => read_file_config(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };
        let env_config: PartialServerConfig = envy::from_iter(vars)?;

        Ok(ServerConfig {
            database_url: env_config
                .database_url
                .or(file_config.database_url)
                .filter(|url| !url.trim().is_empty())
                .ok_or(ServerConfigError::MissingDatabaseUrl)?,
            listen_address: env_config
                .listen_address
                .or(file_config.listen_address)
                .unwrap_or_else(default_listen_address),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
        })
    }
}

fn read_file_config(path: &Path) -> Result<PartialServerConfig, ServerConfigError> {
    if !path.exists() {
        return Ok(PartialServerConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ServerConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ServerConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
