//! Curriculum bandit policy and decision loop for the side-scroller agent
//!
//! This crate provides:
//! - an ε-greedy policy over a growing action universe, with forward bias,
//!   soft discouragement and a late-run guard
//! - the decision loop that drives perception, actuation, reward shaping
//!   and reward-table persistence
//! - the aggregate TOML configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod policy;
pub mod runner;
pub mod utils;

pub use config::{AgentConfig, LoopConfig};
pub use policy::{CurriculumPhase, CurriculumPolicy, PolicyConfig};
pub use runner::{DecisionLoop, RunReport, StepOutcome};
pub use utils::EpsilonSchedule;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{AgentConfig, CurriculumPolicy, DecisionLoop, PolicyConfig, RunReport};
    pub use scroller_rl_core::prelude::*;
}
