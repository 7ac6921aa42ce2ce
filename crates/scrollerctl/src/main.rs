// Scroller control CLI
// Runs the bandit agent against the simulator and inspects learned values

use std::path::PathBuf;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "scrollerctl")]
#[command(about = "Side-scroller bandit agent CLI", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "SCROLLER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent against the simulated game
    Run(Overrides),

    /// Show the best learned actions
    Top {
        /// Number of actions to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Reward table location
        #[arg(long)]
        memory: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    ShowConfig(Overrides),
}

/// Flags that override the configuration file
#[derive(Args, Default, Debug)]
pub struct Overrides {
    /// Number of training episodes
    #[arg(long)]
    pub episodes: Option<u64>,

    /// Delay between actions (seconds)
    #[arg(long)]
    pub delay: Option<f64>,

    /// Reward table location
    #[arg(long)]
    pub memory: Option<PathBuf>,

    /// Policy RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Simulator RNG seed
    #[arg(long)]
    pub sim_seed: Option<u64>,

    /// Softmax temperature for exploitation
    #[arg(long, env = "SOFTMAX_TEMPERATURE")]
    pub softmax_temperature: Option<f64>,

    /// Softmax (1) or value-proportional (0) exploitation
    #[arg(long, env = "USE_SOFTMAX", value_parser = BoolishValueParser::new())]
    pub use_softmax: Option<bool>,

    /// Largest key combination in the full curriculum phase
    #[arg(long, env = "MAX_COMBO_KEYS")]
    pub max_combo_keys: Option<usize>,

    /// Seconds each key is held
    #[arg(long, env = "ACTION_DURATION")]
    pub action_duration: Option<f64>,

    /// Squash the reward through tanh
    #[arg(long, env = "USE_REWARD_TANH", value_parser = BoolishValueParser::new())]
    pub use_reward_tanh: Option<bool>,

    /// Enemy proximity threshold in pixels
    #[arg(long, env = "ENEMY_PROXIMITY_THRESHOLD")]
    pub enemy_proximity_threshold: Option<f64>,

    /// Frames skipped between full state extractions
    #[arg(long, env = "SKIP_N_FRAMES")]
    pub skip_n_frames: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(overrides) => {
            let config = commands::load_config(cli.config.as_deref(), &overrides)?;
            commands::run(config).await?;
        }
        Commands::Top { count, memory } => {
            let overrides = Overrides {
                memory,
                ..Overrides::default()
            };
            let config = commands::load_config(cli.config.as_deref(), &overrides)?;
            commands::show_top(&config, count);
        }
        Commands::ShowConfig(overrides) => {
            let config = commands::load_config(cli.config.as_deref(), &overrides)?;
            print!("{}", commands::render_config(&config)?);
        }
    }

    Ok(())
}
