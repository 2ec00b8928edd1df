//! Training and evaluation loops
//!
//! Drives the interaction between [`DqnAgent`] and [`TradingEnvironment`]:
//! episode rollouts with replay training during learning, and a greedy
//! backtest pass for evaluation.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::rl::agent::DqnAgent;
use crate::rl::config::TrainingConfig;
use crate::rl::env::{Trade, TradingEnvironment};
use crate::rl::memory::Transition;

/// Per-episode training summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeProgress {
    /// 1-based episode number
    pub episode: usize,
    /// Net worth at the end of the episode
    pub final_net_worth: f64,
    /// Sum of rewards collected during the episode
    pub total_reward: f64,
    /// Exploration rate after this episode's decay
    pub epsilon: f64,
}

/// Result of a greedy evaluation pass over a price series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Net worth after every step, starting with the initial balance
    pub portfolio_history: Vec<f64>,
    /// Executed trades in order
    pub trades: Vec<Trade>,
    pub initial_balance: f64,
    pub final_net_worth: f64,
    /// `final_net_worth - initial_balance`
    pub total_profit: f64,
}

/// Run the configured number of training episodes
///
/// `on_progress` is invoked once per completed episode with its summary;
/// the same summaries are also returned in order.
pub fn train_episodes<F>(
    agent: &mut DqnAgent,
    env: &mut TradingEnvironment,
    config: &TrainingConfig,
    mut on_progress: F,
) -> Result<Vec<EpisodeProgress>>
where
    F: FnMut(&EpisodeProgress),
{
    let mut history = Vec::with_capacity(config.episodes);

    for episode in 1..=config.episodes {
        let mut state = env.reset();
        let mut total_reward = 0.0;

        for _ in 0..config.max_steps_per_episode {
            let action = agent.act(&state)?;
            let outcome = env.step(action)?;
            total_reward += outcome.reward;

            agent.remember(Transition::new(
                state,
                action,
                outcome.reward,
                outcome.observation.clone(),
                outcome.done,
            ));
            state = outcome.observation;

            if outcome.done {
                break;
            }
        }

        if agent.buffer_len() > config.batch_size {
            if let Some(loss) = agent.replay(config.batch_size)? {
                debug!(episode, loss, "replay after episode");
            }
        }

        let progress = EpisodeProgress {
            episode,
            final_net_worth: env.net_worth(),
            total_reward,
            epsilon: agent.epsilon(),
        };
        info!(
            episode,
            total = config.episodes,
            net_worth = progress.final_net_worth,
            reward = progress.total_reward,
            epsilon = progress.epsilon,
            "episode complete"
        );
        on_progress(&progress);
        history.push(progress);

        if episode % config.target_update_freq == 0 {
            agent.update_target_model();
            debug!(episode, "target network synced");
        }
    }

    Ok(history)
}

/// Roll the greedy policy over the full series and report the outcome
pub fn run_backtest(agent: &DqnAgent, env: &mut TradingEnvironment) -> Result<BacktestReport> {
    let initial_balance = env.initial_balance();
    let mut state = env.reset();
    let mut portfolio_history = vec![initial_balance];

    loop {
        let action = agent.act_greedy(&state)?;
        let outcome = env.step(action)?;
        portfolio_history.push(outcome.info.net_worth);
        state = outcome.observation;

        if outcome.done {
            break;
        }
    }

    let final_net_worth = env.net_worth();
    let report = BacktestReport {
        portfolio_history,
        trades: env.trade_history().to_vec(),
        initial_balance,
        final_net_worth,
        total_profit: final_net_worth - initial_balance,
    };
    info!(
        final_net_worth = report.final_net_worth,
        total_profit = report.total_profit,
        trades = report.trades.len(),
        "backtest complete"
    );
    Ok(report)
}
