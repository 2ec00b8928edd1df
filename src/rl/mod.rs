//! Reinforcement learning subsystem
//!
//! A DQN trading stack: discrete [`action::Action`]s over a windowed
//! price observation, a gym-style [`env::TradingEnvironment`], experience
//! replay in [`memory`], a trainable Q-network in [`network`], the
//! [`agent::DqnAgent`] tying them together, and episode/backtest drivers
//! in [`trainer`].

pub mod action;
pub mod agent;
pub mod config;
pub mod env;
pub mod memory;
pub mod network;
pub mod trainer;

pub use action::{Action, NUM_ACTIONS};
pub use agent::DqnAgent;
pub use config::{AgentConfig, EnvConfig, RLConfig, TrainingConfig};
pub use env::{StepInfo, StepResult, Trade, TradeKind, TradingEnvironment};
pub use memory::{ReplayBuffer, Transition};
pub use network::QNetwork;
pub use trainer::{run_backtest, train_episodes, BacktestReport, EpisodeProgress};
