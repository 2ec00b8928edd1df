//! RL hyperparameter configuration
//!
//! Grouped into agent, training loop, and environment sections so each
//! consumer takes only the block it needs. Defaults are tuned for the
//! single-instrument daily-close setup and work out of the box.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraderError};

/// Top-level RL configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RLConfig {
    pub agent: AgentConfig,
    pub training: TrainingConfig,
    pub env: EnvConfig,
}

/// Q-learning agent hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// SGD step size
    pub learning_rate: f64,
    /// Discount factor for future rewards
    pub gamma: f64,
    /// Initial exploration rate
    pub epsilon_start: f64,
    /// Multiplicative decay applied after each training step
    pub epsilon_decay: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Replay buffer capacity
    pub buffer_size: usize,
    /// Hidden layer widths of the Q-network
    pub hidden_layers: Vec<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            gamma: 0.95,
            epsilon_start: 1.0,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            buffer_size: 10_000,
            hidden_layers: vec![24, 24],
        }
    }
}

/// Training loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of episodes to run
    pub episodes: usize,
    /// Minibatch size for replay training
    pub batch_size: usize,
    /// Sync the target network every N episodes
    pub target_update_freq: usize,
    /// Safety cap on steps within one episode
    pub max_steps_per_episode: usize,
    /// Where trained weights are written
    pub model_path: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 50,
            batch_size: 32,
            target_update_freq: 10,
            max_steps_per_episode: 500,
            model_path: "models/dqn_trader.json".to_string(),
        }
    }
}

/// Trading environment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Number of recent closes forming the observation
    pub window_size: usize,
    /// Starting cash balance
    pub initial_balance: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            initial_balance: 10_000.0,
        }
    }
}

impl RLConfig {
    /// Validate hyperparameter ranges
    pub fn validate(&self) -> Result<()> {
        let a = &self.agent;
        if a.learning_rate <= 0.0 {
            return Err(TraderError::Validation(
                "learning_rate must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&a.gamma) {
            return Err(TraderError::Validation(
                "gamma must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&a.epsilon_start)
            || !(0.0..=1.0).contains(&a.epsilon_min)
            || a.epsilon_min > a.epsilon_start
        {
            return Err(TraderError::Validation(
                "epsilon bounds must satisfy 0 <= epsilon_min <= epsilon_start <= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&a.epsilon_decay) {
            return Err(TraderError::Validation(
                "epsilon_decay must be in [0, 1]".to_string(),
            ));
        }
        if a.buffer_size == 0 {
            return Err(TraderError::Validation(
                "buffer_size must be positive".to_string(),
            ));
        }
        if a.hidden_layers.iter().any(|&w| w == 0) {
            return Err(TraderError::Validation(
                "hidden layer widths must be positive".to_string(),
            ));
        }

        let t = &self.training;
        if t.episodes == 0 || t.batch_size == 0 || t.max_steps_per_episode == 0 {
            return Err(TraderError::Validation(
                "episodes, batch_size and max_steps_per_episode must be positive".to_string(),
            ));
        }
        if t.target_update_freq == 0 {
            return Err(TraderError::Validation(
                "target_update_freq must be positive".to_string(),
            ));
        }
        if t.batch_size > a.buffer_size {
            return Err(TraderError::Validation(
                "batch_size cannot exceed buffer_size".to_string(),
            ));
        }

        let e = &self.env;
        if e.window_size == 0 {
            return Err(TraderError::Validation(
                "window_size must be positive".to_string(),
            ));
        }
        if e.initial_balance <= 0.0 {
            return Err(TraderError::Validation(
                "initial_balance must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RLConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.gamma, 0.95);
        assert_eq!(config.agent.hidden_layers, vec![24, 24]);
        assert_eq!(config.training.episodes, 50);
        assert_eq!(config.env.window_size, 10);
    }

    #[test]
    fn test_rejects_bad_hyperparameters() {
        let mut config = RLConfig::default();
        config.agent.gamma = 1.5;
        assert!(config.validate().is_err());

        let mut config = RLConfig::default();
        config.agent.epsilon_min = 0.5;
        config.agent.epsilon_start = 0.1;
        assert!(config.validate().is_err());

        let mut config = RLConfig::default();
        config.training.batch_size = 20_000;
        assert!(config.validate().is_err());

        let mut config = RLConfig::default();
        config.env.initial_balance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserializes_partial_toml() {
        let toml = r#"
            [agent]
            gamma = 0.9

            [training]
            episodes = 5
        "#;
        let config: RLConfig = toml_from_str(toml);
        assert_eq!(config.agent.gamma, 0.9);
        assert_eq!(config.agent.learning_rate, 0.001);
        assert_eq!(config.training.episodes, 5);
        assert_eq!(config.env.window_size, 10);
    }

    fn toml_from_str(s: &str) -> RLConfig {
        config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
