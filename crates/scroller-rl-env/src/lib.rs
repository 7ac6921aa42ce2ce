//! Game backends for the side-scroller agent
//!
//! This crate provides:
//! - a seedable in-process side-scrolling simulator that renders RGB frames
//! - colour-keyed pixel perception with a HUD digit strip reader
//! - a dark-screen special-screen detector
//! - a frame-skip perception wrapper

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod perception;
pub mod screen;
pub mod side_scroller;
pub mod wrappers;

// Re-export backends
pub use perception::{ColourKeys, HudLayout, PixelReader, SimulatorPerception};
pub use screen::DarkScreenDetector;
pub use side_scroller::{SideScroller, SideScrollerConfig, SimStatus};
pub use wrappers::FrameSkip;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{DarkScreenDetector, FrameSkip, SideScroller, SideScrollerConfig, SimulatorPerception};
    pub use scroller_rl_core::prelude::*;
}
