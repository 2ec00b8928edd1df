//! Training session state
//!
//! A shared, lockable record of what the bot is doing: current status,
//! per-episode progress, backtest results, and the last error. Readers
//! can poll a [`SessionHandle`] from another thread while training runs.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::data::PriceSeries;
use crate::error::TraderError;
use crate::rl::{
    run_backtest, train_episodes, BacktestReport, DqnAgent, EpisodeProgress, RLConfig,
    TradingEnvironment,
};

/// Minimum rows beyond the observation window needed for a useful run
const MIN_EXTRA_ROWS: usize = 5;

/// What the bot is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Idle,
    Training,
    Backtesting,
    Error,
}

/// Outcome of a start request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartReport {
    pub status: StartStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Success,
    Error,
}

#[derive(Debug)]
struct TrainingSession {
    status: BotStatus,
    progress: Vec<EpisodeProgress>,
    results: Option<BacktestReport>,
    last_error: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

impl Default for TrainingSession {
    fn default() -> Self {
        Self {
            status: BotStatus::Idle,
            progress: Vec::new(),
            results: None,
            last_error: None,
            finished_at: None,
        }
    }
}

/// Shared handle to the session state
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<TrainingSession>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> BotStatus {
        self.read().status
    }

    /// Episode summaries recorded so far
    pub fn training_progress(&self) -> Vec<EpisodeProgress> {
        self.read().progress.clone()
    }

    /// Backtest results from the most recent completed run
    pub fn backtest_results(&self) -> Option<BacktestReport> {
        self.read().results.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.read().finished_at
    }

    /// Train on the series, then backtest the greedy policy on it
    ///
    /// Runs synchronously; progress and results are published through the
    /// handle as they arrive. Refuses to start while a run is already in
    /// flight. Always leaves the session in a terminal status: `Idle` on
    /// success, `Error` otherwise.
    pub fn start_training(&self, series: &PriceSeries, config: &RLConfig) -> StartReport {
        {
            let mut session = self.write();
            match session.status {
                BotStatus::Training | BotStatus::Backtesting => {
                    return StartReport {
                        status: StartStatus::Error,
                        message: "a training run is already in progress".to_string(),
                    };
                }
                BotStatus::Idle | BotStatus::Error => {}
            }

            let required = config.env.window_size + MIN_EXTRA_ROWS;
            if series.len() < required {
                let err = TraderError::InsufficientData {
                    rows: series.len(),
                    required,
                };
                let message = err.to_string();
                error!(%err, "refusing training run");
                session.status = BotStatus::Error;
                session.last_error = Some(message.clone());
                session.finished_at = Some(Utc::now());
                return StartReport {
                    status: StartStatus::Error,
                    message,
                };
            }

            session.status = BotStatus::Training;
            session.progress.clear();
            session.results = None;
            session.last_error = None;
            session.finished_at = None;
        }

        match self.run(series, config) {
            Ok(report) => {
                let mut session = self.write();
                session.results = Some(report);
                session.status = BotStatus::Idle;
                session.finished_at = Some(Utc::now());
                StartReport {
                    status: StartStatus::Success,
                    message: "training and backtest complete".to_string(),
                }
            }
            Err(err) => {
                let message = err.to_string();
                error!(%err, "training run failed");
                let mut session = self.write();
                session.status = BotStatus::Error;
                session.last_error = Some(message.clone());
                session.finished_at = Some(Utc::now());
                StartReport {
                    status: StartStatus::Error,
                    message,
                }
            }
        }
    }

    fn run(&self, series: &PriceSeries, config: &RLConfig) -> crate::error::Result<BacktestReport> {
        let mut env = TradingEnvironment::new(
            series.closes().to_vec(),
            config.env.window_size,
            config.env.initial_balance,
        )?;
        let mut agent = DqnAgent::new(env.observation_dim(), config.agent.clone());

        info!(
            episodes = config.training.episodes,
            rows = series.len(),
            "starting training run"
        );

        let handle = self.clone();
        train_episodes(&mut agent, &mut env, &config.training, |progress| {
            handle.write().progress.push(progress.clone());
        })?;

        self.write().status = BotStatus::Backtesting;
        let report = run_backtest(&agent, &mut env)?;

        // Persistence failures should not discard the run's results
        if let Err(err) = agent.save(&config.training.model_path) {
            warn!(%err, path = %config.training.model_path, "failed to save model weights");
        }

        Ok(report)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, TrainingSession> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, TrainingSession> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
