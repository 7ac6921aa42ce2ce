//! Core types for the pixel-driven side-scroller bandit agent
//!
//! This crate holds everything that does not depend on a concrete game or
//! on the decision loop: the action universe with its blacklist, the
//! per-action reward memory, the HUD counter trend analyser, the composite
//! reward model and the collaborator traits a game backend implements.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod environment;
pub mod error;
pub mod observation;
pub mod reward;
pub mod state;
pub mod trend;
pub mod value;

// Re-export core traits and types
pub use action::{combinations, singles, ActionId, ActionUniverse, Symbol};
pub use environment::{Actuator, NeverSpecial, Perception, SpecialScreenDetector};
pub use error::{RLError, Result};
pub use observation::{Frame, FrameShape, HudRead};
pub use reward::{RewardBreakdown, RewardConfig, RewardInput, RewardModel};
pub use state::{Position, WorldState};
pub use trend::{CounterTrendAnalyser, SlotKey, SlotTrend};
pub use value::{MemoryConfig, RewardMemory};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ActionId, ActionUniverse, Actuator, CounterTrendAnalyser, Frame, HudRead, Perception,
        Result, RewardMemory, RewardModel, SpecialScreenDetector, Symbol, WorldState,
    };
}
