//! Special-screen detection

use serde::{Deserialize, Serialize};

use scroller_rl_core::{Frame, SpecialScreenDetector};

use crate::perception::HUD_ROW;

/// Mean brightness under which a frame counts as a transition screen
pub const DEFAULT_DARK_THRESHOLD: f64 = 16.0;

/// Mean channel value of everything below the HUD row
#[must_use]
pub fn mean_brightness(frame: &Frame) -> f64 {
    let (height, width, channels) = frame.pixels.dim();
    let body = height.saturating_sub(HUD_ROW + 1) * width * channels;
    if body == 0 {
        return 0.0;
    }
    let sum: u64 = frame
        .pixels
        .slice(ndarray::s![HUD_ROW + 1.., .., ..])
        .iter()
        .map(|&p| u64::from(p))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum as f64 / body as f64;
    mean
}

/// Flags near-black frames (respawn, loading, fades)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DarkScreenDetector {
    /// Frames with a mean brightness below this are special
    pub threshold: f64,
}

impl Default for DarkScreenDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DARK_THRESHOLD,
        }
    }
}

impl SpecialScreenDetector for DarkScreenDetector {
    fn is_special(&self, frame: &Frame) -> bool {
        mean_brightness(frame) < self.threshold
    }
}
