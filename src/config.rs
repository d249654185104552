//! Configuration management for the Gutter server

use serde::Deserialize;
use std::env;

use crate::split::{AnalysisConfig, EstimatorConfig, OracleConfig, OracleProvider, TrainConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub oracle: OracleConfig,
    pub analysis: AnalysisConfig,
    pub training: TrainConfig,
    pub estimator: EstimatorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted image upload in bytes
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_image_bytes: 32 * 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "sqlite:./gutter.db".to_string(),
            },
            oracle: OracleConfig::default(),
            analysis: AnalysisConfig::default(),
            training: TrainConfig::default(),
            estimator: EstimatorConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let oracle_provider = match env::var("ORACLE_PROVIDER")
            .unwrap_or_else(|_| "ollama".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => OracleProvider::OpenAI,
            "ollama" => OracleProvider::Ollama,
            other => return Err(ConfigError::Invalid("ORACLE_PROVIDER", other.to_string())),
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
                max_image_bytes: parse_var("MAX_IMAGE_BYTES", defaults.server.max_image_bytes)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            oracle: OracleConfig {
                provider: oracle_provider,
                base_url: env::var("ORACLE_URL").unwrap_or(defaults.oracle.base_url),
                model: env::var("ORACLE_MODEL").unwrap_or(defaults.oracle.model),
                api_key: env::var("ORACLE_API_KEY").ok(),
                timeout_secs: parse_var("ORACLE_TIMEOUT_SECS", defaults.oracle.timeout_secs)?,
            },
            analysis: AnalysisConfig {
                analysis_width: parse_var("ANALYSIS_WIDTH", defaults.analysis.analysis_width)?,
                ..defaults.analysis
            },
            training: TrainConfig {
                seed: optional_var("TRAIN_SEED")?,
                ..defaults.training
            },
            estimator: defaults.estimator,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

fn optional_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(None),
    }
}
