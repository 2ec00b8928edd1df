//! dqn-trader: a DQN trading bot for single-instrument daily closes
//!
//! The crate trains a small Q-network with experience replay and a
//! target network against a windowed-price trading environment, then
//! backtests the greedy policy. See [`rl`] for the learning stack,
//! [`data`] for price loading, and [`session`] for the run lifecycle.

pub mod config;
pub mod data;
pub mod error;
pub mod rl;
pub mod session;

pub use config::AppConfig;
pub use data::PriceSeries;
pub use error::{Result, TraderError};
pub use session::{BotStatus, SessionHandle, StartReport, StartStatus};
