//! Discrete Action Space
//!
//! The environment accepts three actions: hold, buy (all-in), sell (all-out).

use serde::{Deserialize, Serialize};

use crate::error::TraderError;

/// Number of discrete actions
pub const NUM_ACTIONS: usize = 3;

/// Action that can be taken in the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Do nothing
    Hold,
    /// Convert the entire cash balance into shares
    Buy,
    /// Convert all shares held back into cash
    Sell,
}

impl Action {
    /// Index of the action in the Q-value output vector
    pub fn index(self) -> usize {
        match self {
            Action::Hold => 0,
            Action::Buy => 1,
            Action::Sell => 2,
        }
    }

    /// All actions in index order
    pub const ALL: [Action; NUM_ACTIONS] = [Action::Hold, Action::Buy, Action::Sell];
}

impl TryFrom<usize> for Action {
    type Error = TraderError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Action::Hold),
            1 => Ok(Action::Buy),
            2 => Ok(Action::Sell),
            other => Err(TraderError::InvalidAction { action: other }),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Hold => write!(f, "HOLD"),
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}
