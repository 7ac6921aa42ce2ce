//! Colour-keyed pixel perception and the HUD digit strip

use std::collections::VecDeque;

use async_trait::async_trait;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use scroller_rl_core::trend::numeric_values;
use scroller_rl_core::{Frame, HudRead, Perception, Position, RLError, Result, WorldState};

use crate::screen::mean_brightness;
use crate::side_scroller::SideScroller;

/// RGB triple
pub type Rgb = [u8; 3];

/// Row holding the HUD strip
pub const HUD_ROW: usize = 0;

/// Exact colours of the sprites perception looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColourKeys {
    /// Player sprite
    pub player: Rgb,
    /// Enemy sprites
    pub enemy: Rgb,
    /// Coins
    pub coin: Rgb,
    /// Power-ups
    pub powerup: Rgb,
}

impl Default for ColourKeys {
    fn default() -> Self {
        Self {
            player: [255, 0, 255],
            enemy: [0, 168, 0],
            coin: [252, 216, 0],
            powerup: [0, 232, 232],
        }
    }
}

/// Write `tokens` into the HUD row.
///
/// A digit `d` is one pixel with red `d + 1`; a black pixel separates
/// tokens. The rest of the row is cleared.
pub fn encode_hud_strip(pixels: &mut Array3<u8>, tokens: &[String]) {
    let width = pixels.dim().1;
    for x in 0..width {
        for c in 0..3 {
            pixels[[HUD_ROW, x, c]] = 0;
        }
    }
    let mut x = 0;
    for token in tokens {
        for digit in token.chars().filter_map(|ch| ch.to_digit(10)) {
            if x >= width {
                return;
            }
            #[allow(clippy::cast_possible_truncation)]
            let red = digit as u8 + 1;
            pixels[[HUD_ROW, x, 0]] = red;
            x += 1;
        }
        // separator
        x += 1;
    }
}

/// Decode the HUD row into whitespace-separated tokens.
///
/// Pixels that are not a valid digit code come out as `?`, which makes the
/// surrounding token non-numeric, like OCR noise would.
#[must_use]
pub fn read_hud_strip(frame: &Frame) -> HudRead {
    let pixels = &frame.pixels;
    let (height, width, channels) = pixels.dim();
    if height == 0 || channels < 3 {
        return HudRead::default();
    }

    let mut text = String::new();
    let mut in_token = false;
    for x in 0..width {
        let (r, g, b) = (
            pixels[[HUD_ROW, x, 0]],
            pixels[[HUD_ROW, x, 1]],
            pixels[[HUD_ROW, x, 2]],
        );
        if r == 0 && g == 0 && b == 0 {
            in_token = false;
            continue;
        }
        if !in_token && !text.is_empty() {
            text.push(' ');
        }
        in_token = true;
        match (r, g, b) {
            (1..=10, 0, 0) => text.push(char::from(b'0' + r - 1)),
            _ => text.push('?'),
        }
    }
    HudRead::new(text)
}

/// Centroids of 4-connected regions of exactly `colour`, below the HUD row
#[must_use]
pub fn blobs(frame: &Frame, colour: Rgb) -> Vec<Position> {
    let pixels = &frame.pixels;
    let (height, width, channels) = pixels.dim();
    if channels < 3 {
        return Vec::new();
    }
    let matches = |y: usize, x: usize| (0..3).all(|c| pixels[[y, x, c]] == colour[c]);

    let mut seen = vec![false; height * width];
    let mut centroids = Vec::new();
    let mut queue = VecDeque::new();

    for start_y in (HUD_ROW + 1)..height {
        for start_x in 0..width {
            if seen[start_y * width + start_x] || !matches(start_y, start_x) {
                continue;
            }
            seen[start_y * width + start_x] = true;
            queue.push_back((start_y, start_x));
            let (mut sum_x, mut sum_y, mut count) = (0.0, 0.0, 0.0);

            while let Some((y, x)) = queue.pop_front() {
                #[allow(clippy::cast_precision_loss)]
                {
                    sum_x += x as f64;
                    sum_y += y as f64;
                }
                count += 1.0;
                let neighbours = [
                    (y > HUD_ROW + 1).then(|| (y - 1, x)),
                    (y + 1 < height).then(|| (y + 1, x)),
                    (x > 0).then(|| (y, x - 1)),
                    (x + 1 < width).then(|| (y, x + 1)),
                ];
                for (ny, nx) in neighbours.into_iter().flatten() {
                    let idx = ny * width + nx;
                    if !seen[idx] && matches(ny, nx) {
                        seen[idx] = true;
                        queue.push_back((ny, nx));
                    }
                }
            }
            centroids.push((sum_x / count, sum_y / count));
        }
    }
    centroids
}

/// Which HUD slots carry the collectible counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HudLayout {
    /// Slot of the coin counter
    pub coins: Option<usize>,
    /// Slot of the power-up counter
    pub powerups: Option<usize>,
}

impl Default for HudLayout {
    fn default() -> Self {
        Self {
            coins: Some(2),
            powerups: Some(3),
        }
    }
}

/// Turns frames into world states by colour keys
#[derive(Debug, Clone)]
pub struct PixelReader {
    keys: ColourKeys,
    layout: HudLayout,
    dark_threshold: f64,
}

impl PixelReader {
    /// Reader for the given sprite colours and HUD layout
    #[must_use]
    pub fn new(keys: ColourKeys, layout: HudLayout) -> Self {
        Self {
            keys,
            layout,
            dark_threshold: crate::screen::DEFAULT_DARK_THRESHOLD,
        }
    }

    /// Structured state of `frame`; empty for dark frames
    #[must_use]
    pub fn state(&self, frame: &Frame) -> WorldState {
        if mean_brightness(frame) < self.dark_threshold {
            return WorldState::empty();
        }
        let player_pos = blobs(frame, self.keys.player).into_iter().next();
        let enemies = blobs(frame, self.keys.enemy);

        let hud = self.hud(frame);
        let tokens = hud.tokens();
        let counters = numeric_values(tokens.as_slice());
        let slot = |index: Option<usize>| {
            index
                .and_then(|i| counters.get(i))
                .and_then(|&v| u32::try_from(v).ok())
        };

        WorldState {
            player_pos,
            enemy_positions: Some(enemies),
            coins: slot(self.layout.coins),
            powerups: slot(self.layout.powerups),
            ..WorldState::default()
        }
    }

    /// HUD text of `frame`
    #[must_use]
    pub fn hud(&self, frame: &Frame) -> HudRead {
        read_hud_strip(frame)
    }
}

impl Default for PixelReader {
    fn default() -> Self {
        Self::new(ColourKeys::default(), HudLayout::default())
    }
}

/// Perception backed by a [`SideScroller`]
#[derive(Debug, Clone)]
pub struct SimulatorPerception {
    sim: SideScroller,
    reader: PixelReader,
}

impl SimulatorPerception {
    /// Perceive `sim` with its own colour keys
    #[must_use]
    pub fn new(sim: SideScroller) -> Self {
        let reader = PixelReader::new(sim.colour_keys(), HudLayout::default());
        Self { sim, reader }
    }
}

#[async_trait]
impl Perception for SimulatorPerception {
    async fn ensure_ready(&mut self) -> Result<()> {
        if self.sim.is_open() {
            Ok(())
        } else {
            Err(RLError::EnvironmentUnavailable(
                "could not locate the game window".into(),
            ))
        }
    }

    async fn capture(&mut self) -> Result<Frame> {
        self.sim.capture()
    }

    fn extract_state(&self, frame: &Frame) -> WorldState {
        self.reader.state(frame)
    }

    fn extract_hud(&self, frame: &Frame) -> HudRead {
        self.reader.hud(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side_scroller::SideScrollerConfig;
    use approx::assert_relative_eq;

    fn strip(tokens: &[&str]) -> Frame {
        let mut pixels = Array3::<u8>::zeros((4, 32, 3));
        let tokens: Vec<String> = tokens.iter().map(|t| (*t).to_string()).collect();
        encode_hud_strip(&mut pixels, &tokens);
        Frame::new(pixels, 0)
    }

    #[test]
    fn test_hud_strip_round_trip() {
        let frame = strip(&["3", "000120", "05"]);
        assert_eq!(read_hud_strip(&frame).text, "3 000120 05");
    }

    #[test]
    fn test_hud_noise_is_not_numeric() {
        let mut frame = strip(&["3", "42"]);
        frame.pixels[[HUD_ROW, 2, 1]] = 200;
        let hud = read_hud_strip(&frame);
        assert_eq!(hud.text, "3 ?2");
        assert_eq!(numeric_values(hud.tokens().as_slice()), vec![3]);
    }

    #[test]
    fn test_blobs_separates_regions() {
        let mut pixels = Array3::<u8>::zeros((10, 10, 3));
        let key = [1, 2, 3];
        for (y, x) in [(2, 2), (2, 3), (3, 2), (3, 3), (7, 8)] {
            for c in 0..3 {
                pixels[[y, x, c]] = key[c];
            }
        }
        // the HUD row is never a sprite
        for c in 0..3 {
            pixels[[0, 0, c]] = key[c];
        }
        let found = blobs(&Frame::new(pixels, 0), key);
        assert_eq!(found.len(), 2);
        assert_relative_eq!(found[0].0, 2.5);
        assert_relative_eq!(found[0].1, 2.5);
        assert_relative_eq!(found[1].0, 8.0);
        assert_relative_eq!(found[1].1, 7.0);
    }

    #[tokio::test]
    async fn test_simulator_perception_reads_state() {
        let sim = SideScroller::new(SideScrollerConfig {
            enemies: 0,
            coins: 0,
            seed: Some(2),
            ..SideScrollerConfig::default()
        });
        let mut perception = SimulatorPerception::new(sim.clone());
        perception.ensure_ready().await.unwrap();

        let frame = perception.capture().await.unwrap();
        let state = perception.extract_state(&frame);
        let (px, py) = state.player_pos.unwrap();
        let truth = sim.status().unwrap().player;
        assert!((px - truth.0).abs() <= 1.0);
        assert!((py - truth.1).abs() <= 1.0);
        assert_eq!(state.enemy_positions, Some(Vec::new()));
        assert_eq!(state.coins, Some(0));

        let hud = perception.extract_hud(&frame);
        assert_eq!(hud.tokens(), vec!["3", "000000", "00", "0", "400"]);
    }

    #[tokio::test]
    async fn test_closed_window_not_ready() {
        let sim = SideScroller::new(SideScrollerConfig::default());
        let mut perception = SimulatorPerception::new(sim.clone());
        sim.close();
        assert!(matches!(
            perception.ensure_ready().await,
            Err(RLError::EnvironmentUnavailable(_))
        ));
    }
}
