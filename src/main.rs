use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dqn_trader::rl::{run_backtest, DqnAgent, TradingEnvironment};
use dqn_trader::{AppConfig, PriceSeries, SessionHandle, StartStatus};

#[derive(Parser)]
#[command(name = "dqn-trader", about = "DQN trading bot over daily close prices")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "DQN_TRADER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the price CSV path from the config
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Override the model weights path from the config
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Override the number of training episodes
    #[arg(short, long)]
    episodes: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the agent and backtest it on the training series
    Train,
    /// Backtest saved weights on the held-out evaluation split
    Evaluate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(model) = &cli.model {
        config.rl.training.model_path = model.to_string_lossy().into_owned();
    }
    if let Some(episodes) = cli.episodes {
        config.rl.training.episodes = episodes;
        config.rl.validate().context("validating overrides")?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    let data_path = cli
        .data
        .unwrap_or_else(|| PathBuf::from(&config.data.path));
    let series = PriceSeries::load_csv(&data_path)
        .with_context(|| format!("loading prices from {}", data_path.display()))?;
    let series = if config.data.normalize {
        series.normalized()
    } else {
        series
    };
    let (train_series, eval_series) = series.split(config.data.train_ratio)?;

    match cli.command {
        Command::Train => {
            let session = SessionHandle::new();
            let report = session.start_training(&train_series, &config.rl);

            if report.status == StartStatus::Error {
                anyhow::bail!("training failed: {}", report.message);
            }

            if let Some(results) = session.backtest_results() {
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
        }
        Command::Evaluate => {
            let mut env = TradingEnvironment::new(
                eval_series.closes().to_vec(),
                config.rl.env.window_size,
                config.rl.env.initial_balance,
            )?;
            let mut agent = DqnAgent::new(env.observation_dim(), config.rl.agent.clone());
            agent
                .load(&config.rl.training.model_path)
                .with_context(|| {
                    format!("loading weights from {}", config.rl.training.model_path)
                })?;

            let report = run_backtest(&agent, &mut env)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
