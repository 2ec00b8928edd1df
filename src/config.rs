//! Application configuration
//!
//! Layered loading: built-in defaults, then an optional config file,
//! then `DQN_TRADER__*` environment variables (`__` separates nesting,
//! e.g. `DQN_TRADER__RL__TRAINING__EPISODES=100`).

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rl::RLConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub rl: RLConfig,
    pub logging: LoggingConfig,
}

/// Price data source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file with a `Close` column
    pub path: String,
    /// Min-max normalize prices before training
    pub normalize: bool,
    /// Chronological train fraction for the evaluation split
    pub train_ratio: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: "data/prices.csv".to_string(),
            normalize: false,
            train_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable via `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration, optionally layering a file over the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config: AppConfig = builder
            .add_source(Environment::with_prefix("DQN_TRADER").separator("__"))
            .build()?
            .try_deserialize()?;

        config.rl.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_no_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.data.train_ratio, 0.8);
        assert_eq!(config.rl.training.episodes, 50);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        write!(
            file,
            "[data]\npath = \"closes.csv\"\nnormalize = true\n\n\
             [rl.training]\nepisodes = 7\n"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.data.path, "closes.csv");
        assert!(config.data.normalize);
        assert_eq!(config.rl.training.episodes, 7);
        // Untouched keys keep their defaults
        assert_eq!(config.rl.agent.gamma, 0.95);
    }

    #[test]
    fn test_invalid_hyperparameters_rejected() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        write!(file, "[rl.agent]\ngamma = 2.0\n").unwrap();

        assert!(AppConfig::load(Some(file.path())).is_err());
    }
}
