// Command implementations for scrollerctl

use std::path::Path;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use scroller_rl_agent::{AgentConfig, DecisionLoop, RunReport};
use scroller_rl_core::RewardMemory;
use scroller_rl_env::{DarkScreenDetector, FrameSkip, SideScroller, SideScrollerConfig, SimulatorPerception};

use crate::Overrides;

/// Everything the CLI can configure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtlConfig {
    /// Frames skipped between full state extractions
    pub skip_frames: u64,
    /// Agent sections (`[policy]`, `[reward]`, `[memory]`, `[loop]`)
    #[serde(flatten)]
    pub agent: AgentConfig,
    /// Simulated game
    pub simulator: SideScrollerConfig,
}

impl Default for CtlConfig {
    fn default() -> Self {
        Self {
            skip_frames: 1,
            agent: AgentConfig::default(),
            simulator: SideScrollerConfig::default(),
        }
    }
}

/// Read the optional config file, then apply flag and environment overrides
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<CtlConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => CtlConfig::default(),
    };
    apply(&mut config, overrides);
    config.agent.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply(config: &mut CtlConfig, o: &Overrides) {
    let agent = &mut config.agent;
    if let Some(v) = o.episodes {
        agent.run.episodes = v;
    }
    if let Some(v) = o.delay {
        agent.run.step_delay = v;
    }
    if let Some(v) = &o.memory {
        agent.run.memory_path.clone_from(v);
    }
    if let Some(v) = o.seed {
        agent.policy.seed = Some(v);
    }
    if let Some(v) = o.softmax_temperature {
        agent.policy.softmax_temperature = v;
    }
    if let Some(v) = o.use_softmax {
        agent.policy.use_softmax = v;
    }
    if let Some(v) = o.max_combo_keys {
        agent.policy.max_combo = v;
    }
    if let Some(v) = o.action_duration {
        agent.run.action_duration = v;
    }
    if let Some(v) = o.use_reward_tanh {
        agent.reward.squash = v;
    }
    if let Some(v) = o.enemy_proximity_threshold {
        agent.reward.enemy_proximity_threshold = v;
    }
    if let Some(v) = o.skip_n_frames {
        config.skip_frames = v;
    }
    if let Some(v) = o.sim_seed {
        config.simulator.seed = Some(v);
    }
}

/// Effective configuration as TOML
pub fn render_config(config: &CtlConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}

/// Run the agent against the simulator until done or Ctrl-C
pub async fn run(config: CtlConfig) -> Result<()> {
    println!("🎮 Starting side-scroller agent");
    println!("   Episodes: {}", config.agent.run.episodes);
    println!("   Reward table: {}", config.agent.run.memory_path.display());
    println!("   Frame skip: {}", config.skip_frames);

    let sim = SideScroller::new(config.simulator.clone());
    let perception = FrameSkip::new(SimulatorPerception::new(sim.clone()), config.skip_frames);
    let mut agent = DecisionLoop::new(&config.agent, perception, sim, DarkScreenDetector::default())
        .context("Failed to build decision loop")?;

    let stop = agent.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Stop requested, finishing current step");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let report = agent.run().await.context("Agent run failed")?;
    print_report(&report);

    let slots = agent.analyser().slot_info();
    if !slots.is_empty() {
        println!("\n📟 HUD slot trends:");
        for (slot, trend) in slots {
            println!(
                "   {:<8} direction {:+}  weight {:+.2}",
                slot.to_string(),
                trend.direction,
                trend.weight
            );
        }
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    let status = if report.stopped_early { "stopped" } else { "completed" };
    println!("\n✅ Run {} ({})", report.run_id, status);
    println!("   Steps: {}", report.steps);
    println!("   Total reward: {:+.3}", report.total_reward);
    println!("   Final epsilon: {:.3}", report.final_epsilon);
    println!(
        "   Duration: {:.1}s",
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );

    println!("\n🏆 Top {} actions by value:", report.leaderboard.len());
    for (action, value) in &report.leaderboard {
        println!("   {action:<16} {value:+.3}");
    }
    if !report.blacklisted.is_empty() {
        let keys: Vec<&str> = report.blacklisted.iter().map(|a| a.as_key()).collect();
        println!("\n🚫 Blacklisted: {}", keys.join(", "));
    }
}

/// Print the best actions of the saved reward table
pub fn show_top(config: &CtlConfig, count: usize) {
    let path = &config.agent.run.memory_path;
    let memory = RewardMemory::load(path, config.agent.memory);
    if memory.is_empty() {
        println!("No learned actions at {}", path.display());
        return;
    }

    println!("🏆 Top actions in {}:\n", path.display());
    println!("   {:<16} {:>8} {:>6}", "ACTION", "VALUE", "USES");
    for (action, value) in memory.leaderboard(count) {
        println!("   {:<16} {:>+8.3} {:>6}", action.as_key(), value, memory.usage(&action));
    }
}
