//! Raw observations handed over by the perception backend

use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Captured screen image, `height × width × channels`, row-major RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Pixel data indexed as `[y, x, channel]`
    pub pixels: Array3<u8>,
    /// Monotonic capture counter assigned by the backend
    pub sequence: u64,
}

impl Frame {
    /// Wrap a pixel buffer
    #[must_use]
    pub fn new(pixels: Array3<u8>, sequence: u64) -> Self {
        Self { pixels, sequence }
    }

    /// Blank (all black) RGB frame
    #[must_use]
    pub fn blank(height: usize, width: usize) -> Self {
        Self::new(Array3::zeros((height, width, 3)), 0)
    }

    /// Height in pixels
    #[must_use]
    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    /// Width in pixels
    #[must_use]
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    /// Number of colour channels
    #[must_use]
    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    /// `(height, width)` as consumed by the reward model
    #[must_use]
    pub fn shape(&self) -> FrameShape {
        FrameShape {
            height: self.height(),
            width: self.width(),
        }
    }
}

/// Pixel dimensions of an observation frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    /// Rows
    pub height: usize,
    /// Columns
    pub width: usize,
}

impl FrameShape {
    /// Construct from explicit dimensions
    #[must_use]
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

/// Free-form HUD text read from a frame (OCR output or equivalent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HudRead {
    /// Raw text, tokenized on whitespace by consumers
    pub text: String,
}

impl HudRead {
    /// Wrap a HUD string
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Whitespace-separated tokens
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.text.split_whitespace().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shape() {
        let frame = Frame::blank(240, 256);
        assert_eq!(frame.shape(), FrameShape::new(240, 256));
        assert_eq!(frame.channels(), 3);
    }

    #[test]
    fn test_hud_tokens() {
        let hud = HudRead::new("  3 000120\tx 07 ");
        assert_eq!(hud.tokens(), vec!["3", "000120", "x", "07"]);
        assert!(HudRead::default().tokens().is_empty());
    }
}
