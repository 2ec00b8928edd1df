//! Trading Environment
//!
//! Gym-like step/reset interface over a single historical closing-price
//! series. Portfolio sizing is all-in/all-out: a buy converts the entire
//! cash balance into shares, a sell liquidates the whole position. The
//! reward for a step is the raw net-worth delta, deliberately unscaled.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TraderError};
use crate::rl::action::Action;

/// Direction of an executed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeKind {
    Buy,
    Sell,
}

/// Record of a single executed trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Step index at which the trade executed
    pub step: usize,
    #[serde(rename = "type")]
    pub kind: TradeKind,
    /// Execution price
    pub price: f64,
    /// Shares bought or sold
    pub shares: f64,
}

/// Result of taking a step in the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    /// New observation after action
    pub observation: Vec<f64>,
    /// Reward: net worth after the step minus net worth before it
    pub reward: f64,
    /// Whether the episode has ended
    pub done: bool,
    /// Portfolio snapshot after the step
    pub info: StepInfo,
}

/// Portfolio snapshot attached to each step result
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    pub balance: f64,
    pub shares_held: f64,
    pub net_worth: f64,
}

/// Lifecycle of the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Done,
}

/// Trading environment over a closing-price series
pub struct TradingEnvironment {
    prices: Vec<f64>,
    window_size: usize,
    initial_balance: f64,

    phase: Phase,
    current_step: usize,
    balance: f64,
    shares_held: f64,
    net_worth_history: Vec<f64>,
    trade_history: Vec<Trade>,
}

impl TradingEnvironment {
    /// Create a new environment
    ///
    /// Fails if the series is empty, contains non-finite or negative
    /// prices, or the window/balance parameters are out of range.
    pub fn new(prices: Vec<f64>, window_size: usize, initial_balance: f64) -> Result<Self> {
        if prices.is_empty() {
            return Err(TraderError::Validation("price series must not be empty".to_string()));
        }
        if prices.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(TraderError::Validation(
                "price series must contain only finite, non-negative values".to_string(),
            ));
        }
        if window_size == 0 {
            return Err(TraderError::Validation("window_size must be > 0".to_string()));
        }
        if !initial_balance.is_finite() || initial_balance <= 0.0 {
            return Err(TraderError::Validation("initial_balance must be > 0".to_string()));
        }

        Ok(Self {
            prices,
            window_size,
            initial_balance,
            phase: Phase::NotStarted,
            current_step: 0,
            balance: initial_balance,
            shares_held: 0.0,
            net_worth_history: Vec::new(),
            trade_history: Vec::new(),
        })
    }

    /// Reset the environment for a new episode and return the initial state
    pub fn reset(&mut self) -> Vec<f64> {
        self.phase = Phase::Running;
        self.current_step = 0;
        self.balance = self.initial_balance;
        self.shares_held = 0.0;
        self.net_worth_history = vec![self.initial_balance];
        self.trade_history.clear();

        self.observation()
    }

    /// Execute one step
    ///
    /// Reads the price at the current step, applies the action to the
    /// portfolio, advances one step and computes the reward as the
    /// net-worth delta. Once the episode is done, further calls fail
    /// rather than reading past the end of the series.
    pub fn step(&mut self, action: Action) -> Result<StepResult> {
        match self.phase {
            Phase::NotStarted => {
                return Err(TraderError::InvalidState(
                    "environment must be reset before stepping".to_string(),
                ))
            }
            Phase::Done => {
                return Err(TraderError::InvalidState(
                    "episode is done; reset the environment to start a new one".to_string(),
                ))
            }
            Phase::Running => {}
        }

        let current_price = self.prices[self.current_step];
        let previous_net_worth = self.net_worth();

        match action {
            Action::Buy => {
                if self.balance > 0.0 {
                    let shares_to_buy = self.balance / current_price;
                    self.shares_held += shares_to_buy;
                    self.balance = 0.0;
                    self.trade_history.push(Trade {
                        step: self.current_step,
                        kind: TradeKind::Buy,
                        price: current_price,
                        shares: shares_to_buy,
                    });
                }
            }
            Action::Sell => {
                if self.shares_held > 0.0 {
                    let shares_sold = self.shares_held;
                    self.balance += shares_sold * current_price;
                    self.shares_held = 0.0;
                    self.trade_history.push(Trade {
                        step: self.current_step,
                        kind: TradeKind::Sell,
                        price: current_price,
                        shares: shares_sold,
                    });
                }
            }
            Action::Hold => {}
        }

        self.current_step += 1;
        let current_net_worth = self.net_worth();
        self.net_worth_history.push(current_net_worth);

        let reward = current_net_worth - previous_net_worth;

        let done = self.current_step >= self.prices.len() - 1;
        if done {
            self.phase = Phase::Done;
        }

        let observation = if done {
            vec![0.0; self.window_size]
        } else {
            self.observation()
        };

        debug!(
            step = self.current_step,
            %action,
            price = current_price,
            balance = self.balance,
            shares_held = self.shares_held,
            net_worth = current_net_worth,
            "env step"
        );

        Ok(StepResult {
            observation,
            reward,
            done,
            info: StepInfo {
                balance: self.balance,
                shares_held: self.shares_held,
                net_worth: current_net_worth,
            },
        })
    }

    /// Window of the most recent `window_size` closing prices
    ///
    /// Left-padded with the earliest price while fewer than `window_size`
    /// observations exist.
    fn observation(&self) -> Vec<f64> {
        let end = self.current_step + 1;
        let mut state = Vec::with_capacity(self.window_size);

        if end < self.window_size {
            state.resize(self.window_size - end, self.prices[0]);
            state.extend_from_slice(&self.prices[..end]);
        } else {
            state.extend_from_slice(&self.prices[end - self.window_size..end]);
        }
        state
    }

    /// Current total portfolio value: cash plus shares at the current price
    pub fn net_worth(&self) -> f64 {
        let price_idx = self.current_step.min(self.prices.len() - 1);
        self.balance + self.shares_held * self.prices[price_idx]
    }

    /// Net-worth trajectory for the current episode
    pub fn net_worth_history(&self) -> &[f64] {
        &self.net_worth_history
    }

    /// Trades executed during the current episode
    pub fn trade_history(&self) -> &[Trade] {
        &self.trade_history
    }

    /// Length of the state vector
    pub fn observation_dim(&self) -> usize {
        self.window_size
    }

    /// Starting cash balance
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Number of prices in the series
    pub fn series_len(&self) -> usize {
        self.prices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_env() -> TradingEnvironment {
        TradingEnvironment::new(vec![50.0; 20], 5, 1000.0).unwrap()
    }

    #[test]
    fn test_reset_restores_portfolio() {
        let mut env = flat_env();
        env.reset();
        env.step(Action::Buy).unwrap();
        env.step(Action::Hold).unwrap();

        let obs = env.reset();
        assert_eq!(obs.len(), 5);
        assert_eq!(env.net_worth(), 1000.0);
        assert!(env.trade_history().is_empty());
        assert_eq!(env.net_worth_history(), &[1000.0]);
    }

    #[test]
    fn test_initial_state_left_padded() {
        let prices: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let mut env = TradingEnvironment::new(prices, 5, 1000.0).unwrap();

        // Only price[0] exists at step 0; the rest of the window pads with it
        assert_eq!(env.reset(), vec![1.0, 1.0, 1.0, 1.0, 1.0]);

        env.step(Action::Hold).unwrap();
        let result = env.step(Action::Hold).unwrap();
        assert_eq!(result.observation, vec![1.0, 1.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_full_window_slides() {
        let prices: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let mut env = TradingEnvironment::new(prices, 3, 1000.0).unwrap();
        env.reset();

        for _ in 0..5 {
            env.step(Action::Hold).unwrap();
        }
        // After the sixth step the window covers prices[4..=6]
        let result = env.step(Action::Hold).unwrap();
        assert_eq!(result.observation, vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_flat_series_rewards_are_zero() {
        let mut env = flat_env();
        env.reset();

        let actions = [Action::Buy, Action::Hold, Action::Sell, Action::Buy, Action::Hold];
        for action in actions.iter().cycle().take(19) {
            let result = env.step(*action).unwrap();
            assert_eq!(result.reward, 0.0);
            assert_eq!(result.info.net_worth, 1000.0);
            if result.done {
                break;
            }
        }
    }

    #[test]
    fn test_buy_then_sell_accounting() {
        let mut prices = vec![10.0, 12.0];
        prices.extend(vec![12.0; 8]);
        let mut env = TradingEnvironment::new(prices, 3, 1000.0).unwrap();
        env.reset();

        // Buy at 10: whole balance converts to 100 shares
        let result = env.step(Action::Buy).unwrap();
        assert_eq!(result.info.balance, 0.0);
        assert_eq!(result.info.shares_held, 100.0);
        // Net worth is marked at the next price (12): reward = 1200 - 1000
        assert_eq!(result.reward, 200.0);

        // Sell at 12: all shares convert back to cash
        let result = env.step(Action::Sell).unwrap();
        assert_eq!(result.info.balance, 1200.0);
        assert_eq!(result.info.shares_held, 0.0);
        assert_eq!(result.reward, 0.0);

        let trades = env.trade_history();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].kind, TradeKind::Buy);
        assert_eq!(trades[0].price, 10.0);
        assert_eq!(trades[0].shares, 100.0);
        assert_eq!(trades[1].kind, TradeKind::Sell);
        assert_eq!(trades[1].price, 12.0);
    }

    #[test]
    fn test_buy_with_no_balance_is_noop() {
        let mut env = flat_env();
        env.reset();
        env.step(Action::Buy).unwrap();

        let result = env.step(Action::Buy).unwrap();
        assert_eq!(env.trade_history().len(), 1);
        assert_eq!(result.info.balance, 0.0);
    }

    #[test]
    fn test_sell_with_no_shares_is_noop() {
        let mut env = flat_env();
        env.reset();

        let result = env.step(Action::Sell).unwrap();
        assert!(env.trade_history().is_empty());
        assert_eq!(result.info.balance, 1000.0);
    }

    #[test]
    fn test_reward_matches_net_worth_delta() {
        let prices: Vec<f64> = (1..=15).map(|i| (i as f64).sin().abs() * 10.0 + 5.0).collect();
        let mut env = TradingEnvironment::new(prices, 4, 500.0).unwrap();
        env.reset();

        let actions = [Action::Buy, Action::Hold, Action::Sell];
        let mut idx = 0;
        loop {
            let before = env.net_worth();
            let result = env.step(actions[idx % 3]).unwrap();
            idx += 1;
            assert!((result.reward - (env.net_worth() - before)).abs() < 1e-12);
            if result.done {
                break;
            }
        }

        // History holds the initial balance plus one entry per step
        assert_eq!(env.net_worth_history().len(), idx + 1);
    }

    #[test]
    fn test_terminates_at_last_index() {
        let mut env = TradingEnvironment::new(vec![10.0; 6], 3, 100.0).unwrap();
        env.reset();

        for _ in 0..4 {
            let result = env.step(Action::Hold).unwrap();
            assert!(!result.done);
        }
        let result = env.step(Action::Hold).unwrap();
        assert!(result.done);
        assert_eq!(result.observation, vec![0.0; 3]);

        // Stepping past the end is an error, not a read past the series
        assert!(matches!(
            env.step(Action::Hold).unwrap_err(),
            TraderError::InvalidState(_)
        ));
    }

    #[test]
    fn test_step_before_reset_rejected() {
        let mut env = flat_env();
        assert!(matches!(
            env.step(Action::Hold).unwrap_err(),
            TraderError::InvalidState(_)
        ));
    }

    #[test]
    fn test_constructor_validation() {
        assert!(TradingEnvironment::new(vec![], 5, 1000.0).is_err());
        assert!(TradingEnvironment::new(vec![1.0; 10], 0, 1000.0).is_err());
        assert!(TradingEnvironment::new(vec![1.0; 10], 5, 0.0).is_err());
        assert!(TradingEnvironment::new(vec![1.0, f64::NAN], 2, 100.0).is_err());
    }

    #[test]
    fn test_net_worth_stays_non_negative() {
        let prices: Vec<f64> = (0..30).map(|i| ((i * 7 + 3) % 13) as f64 + 1.0).collect();
        let mut env = TradingEnvironment::new(prices, 5, 250.0).unwrap();
        env.reset();

        let actions = [Action::Buy, Action::Sell, Action::Hold, Action::Buy];
        for action in actions.iter().cycle() {
            let result = env.step(*action).unwrap();
            assert!(result.info.balance >= 0.0);
            assert!(result.info.shares_held >= 0.0);
            assert!(result.info.net_worth >= 0.0);
            if result.done {
                break;
            }
        }
    }
}
