//! Aggregate agent configuration, loadable from TOML

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scroller_rl_core::value::DEFAULT_MEMORY_PATH;
use scroller_rl_core::{ActionId, MemoryConfig, RLError, Result, RewardConfig};

use crate::policy::PolicyConfig;

/// Timing and bookkeeping of the decision loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Number of decision steps to run
    pub episodes: u64,
    /// Seconds an action is held, per symbol
    pub action_duration: f64,
    /// Extra seconds to wait for the world to respond
    pub grace_period: f64,
    /// Seconds between captures while waiting for a state change
    pub poll_interval: f64,
    /// Seconds between captures while a special screen is shown
    pub special_poll_interval: f64,
    /// Pause in seconds after each step
    pub step_delay: f64,
    /// Save the reward table every this many episodes
    pub checkpoint_every: u64,
    /// Entries in the end-of-run leaderboard
    pub leaderboard_size: usize,
    /// Reward table location
    pub memory_path: PathBuf,
    /// HUD observations kept by the trend analyser
    pub hud_history: usize,
    /// Optional semantic names for HUD slots
    pub hud_slot_names: Option<Vec<String>>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            episodes: 500,
            action_duration: 1.0,
            grace_period: 0.1,
            poll_interval: 0.01,
            special_poll_interval: 0.01,
            step_delay: 0.0,
            checkpoint_every: 25,
            leaderboard_size: 10,
            memory_path: PathBuf::from(DEFAULT_MEMORY_PATH),
            hud_history: 10,
            hud_slot_names: None,
        }
    }
}

impl LoopConfig {
    /// Hold time of `action`: the base duration times its symbol count
    #[must_use]
    pub fn duration_of(&self, action: &ActionId) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let secs = self.action_duration * action.len() as f64;
        seconds(secs)
    }

    /// Grace period as a [`Duration`]
    #[must_use]
    pub fn grace(&self) -> Duration {
        seconds(self.grace_period)
    }

    /// State-change poll interval as a [`Duration`]
    #[must_use]
    pub fn poll(&self) -> Duration {
        seconds(self.poll_interval)
    }

    /// Special-screen poll interval as a [`Duration`]
    #[must_use]
    pub fn special_poll(&self) -> Duration {
        seconds(self.special_poll_interval)
    }

    /// Inter-step pause as a [`Duration`]
    #[must_use]
    pub fn delay(&self) -> Duration {
        seconds(self.step_delay)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("action_duration", self.action_duration),
            ("grace_period", self.grace_period),
            ("poll_interval", self.poll_interval),
            ("special_poll_interval", self.special_poll_interval),
            ("step_delay", self.step_delay),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RLError::InvalidConfig(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        if self.checkpoint_every == 0 {
            return Err(RLError::InvalidConfig("checkpoint_every must be at least 1".into()));
        }
        if self.hud_history < 2 {
            return Err(RLError::InvalidConfig("hud_history must hold at least 2 reads".into()));
        }
        if self.hud_slot_names.as_ref().is_some_and(Vec::is_empty) {
            return Err(RLError::InvalidConfig("hud_slot_names must not be empty when set".into()));
        }
        Ok(())
    }
}

fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Everything needed to build a decision loop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Action selection
    pub policy: PolicyConfig,
    /// Reward shaping
    pub reward: RewardConfig,
    /// Value table blending
    pub memory: MemoryConfig,
    /// Loop timing and persistence
    #[serde(rename = "loop")]
    pub run: LoopConfig,
}

impl AgentConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RLError::InvalidConfig(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| RLError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RLError::InvalidConfig(e.to_string()))
    }

    /// Check every section for values the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.run.validate()?;

        let alpha = self.memory.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(RLError::InvalidConfig(format!(
                "memory alpha must be within (0, 1], got {alpha}"
            )));
        }
        if !(self.memory.clip > 0.0) {
            return Err(RLError::InvalidConfig("memory clip must be positive".into()));
        }
        if self.reward.enemy_proximity_threshold < 0.0 {
            return Err(RLError::InvalidConfig(
                "enemy_proximity_threshold must not be negative".into(),
            ));
        }
        Ok(())
    }
}
