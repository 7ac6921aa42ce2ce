//! Composite reward shaping from before/after observations

use serde::{Deserialize, Serialize};

use crate::trend::numeric_values;
use crate::{CounterTrendAnalyser, FrameShape, HudRead, WorldState};

/// Weights and penalties of the reward model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Weight of forward progress normalized by frame width
    pub horizontal_weight: f64,
    /// Penalty when the player did not move horizontally
    pub stagnation_penalty: f64,
    /// Weight of upward progress normalized by frame height
    pub vertical_weight: f64,
    /// Extra multiplier on the downward part of vertical movement
    pub downward_penalty: f64,
    /// Divisor applied to the raw HUD delta before `tanh`
    pub hud_divisor: f64,
    /// Raw HUD delta is clamped to `[-hud_clamp, hud_clamp]`
    pub hud_clamp: f64,
    /// Reward per enemy defeated
    pub enemy_kill_weight: f64,
    /// Reward per pixel of increased distance to the nearest enemy
    pub enemy_avoid_weight: f64,
    /// Distance in pixels under which an enemy counts as close
    pub enemy_proximity_threshold: f64,
    /// Penalty weight when starting a step too close to an enemy
    pub close_penalty_weight: f64,
    /// Reward per coin gained
    pub coin_weight: f64,
    /// Reward per power-up gained
    pub powerup_weight: f64,
    /// Penalty when the lives counter drops
    pub life_loss_penalty: f64,
    /// Weight of level progress delta
    pub progression_weight: f64,
    /// Reward per collected item
    pub item_collection_weight: f64,
    /// Reward per combo increment
    pub combo_bonus: f64,
    /// Constant cost per step
    pub time_penalty: f64,
    /// Squash the final sum through `tanh`
    pub squash: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            horizontal_weight: 1.0,
            stagnation_penalty: 0.02,
            vertical_weight: 0.3,
            downward_penalty: 0.2,
            hud_divisor: 10.0,
            hud_clamp: 100.0,
            enemy_kill_weight: 0.6,
            enemy_avoid_weight: 0.5,
            enemy_proximity_threshold: 50.0,
            close_penalty_weight: 0.2,
            coin_weight: 0.3,
            powerup_weight: 0.7,
            life_loss_penalty: 5.0,
            progression_weight: 1.0,
            item_collection_weight: 0.5,
            combo_bonus: 0.2,
            time_penalty: 0.01,
            squash: false,
        }
    }
}

/// Everything one reward computation looks at
#[derive(Debug, Clone, Copy)]
pub struct RewardInput<'a> {
    /// State before the action
    pub prev: &'a WorldState,
    /// State after the action
    pub next: &'a WorldState,
    /// HUD read before the action
    pub hud_before: Option<&'a HudRead>,
    /// HUD read after the action
    pub hud_after: Option<&'a HudRead>,
    /// Learned HUD slot trends
    pub analyser: &'a CounterTrendAnalyser,
    /// Frame dimensions used for normalization
    pub frame: FrameShape,
    /// Caller-measured player displacement `(dx, dy)`, screen axes.
    /// Drives the movement terms whenever both snapshots carry a position.
    pub displacement: (f64, f64),
}

/// Per-term contributions; `total` is what gets learned
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Forward progress and stagnation penalty
    pub horizontal: f64,
    /// Upward progress and downward penalty
    pub vertical: f64,
    /// Compressed raw HUD digit delta
    pub hud_raw: f64,
    /// Compressed trend-weighted HUD delta
    pub hud_weighted: f64,
    /// Defeats, proximity penalty and avoidance bonus
    pub enemy: f64,
    /// Coins and power-ups
    pub collectibles: f64,
    /// Lives counter drop
    pub life_loss: f64,
    /// Level progress, items and combos
    pub progression: f64,
    /// Constant per-step cost
    pub time: f64,
    /// Final reward (after optional squashing)
    pub total: f64,
}

impl RewardBreakdown {
    /// Sum of components before squashing
    #[must_use]
    pub fn raw_sum(&self) -> f64 {
        self.horizontal
            + self.vertical
            + self.hud_raw
            + self.hud_weighted
            + self.enemy
            + self.collectibles
            + self.life_loss
            + self.progression
            + self.time
    }
}

/// Stateless reward model; all state arrives through [`RewardInput`].
#[derive(Debug, Clone, Default)]
pub struct RewardModel {
    config: RewardConfig,
}

impl RewardModel {
    /// Model with the given weights
    #[must_use]
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    /// Weights in use
    #[must_use]
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Compute the reward of one step.
    ///
    /// Terms whose inputs are missing from either snapshot contribute zero.
    /// Non-finite terms are zeroed.
    #[must_use]
    pub fn compute(&self, input: &RewardInput<'_>) -> RewardBreakdown {
        let prev_tokens = input.hud_before.map(HudRead::tokens).unwrap_or_default();
        let curr_tokens = input.hud_after.map(HudRead::tokens).unwrap_or_default();

        let (horizontal, vertical) = self.movement(input);
        let (hud_raw, hud_weighted) =
            self.hud(input.analyser, prev_tokens.as_slice(), curr_tokens.as_slice());

        let mut breakdown = RewardBreakdown {
            horizontal: finite_or_zero(horizontal),
            vertical: finite_or_zero(vertical),
            hud_raw: finite_or_zero(hud_raw),
            hud_weighted: finite_or_zero(hud_weighted),
            enemy: finite_or_zero(self.enemy(input.prev, input.next)),
            collectibles: finite_or_zero(self.collectibles(input.prev, input.next)),
            life_loss: self.life_loss(prev_tokens.as_slice(), curr_tokens.as_slice()),
            progression: finite_or_zero(self.progression(input.prev, input.next)),
            time: -self.config.time_penalty,
            total: 0.0,
        };

        let sum = breakdown.raw_sum();
        breakdown.total = if self.config.squash { sum.tanh() } else { sum };

        tracing::debug!(
            dx = input.displacement.0,
            dy = input.displacement.1,
            horizontal = breakdown.horizontal,
            vertical = breakdown.vertical,
            hud_raw = breakdown.hud_raw,
            hud_weighted = breakdown.hud_weighted,
            enemy = breakdown.enemy,
            collectibles = breakdown.collectibles,
            life_loss = breakdown.life_loss,
            progression = breakdown.progression,
            total = breakdown.total,
            "Reward breakdown"
        );
        breakdown
    }

    fn movement(&self, input: &RewardInput<'_>) -> (f64, f64) {
        if input.prev.player_pos.is_none() || input.next.player_pos.is_none() {
            return (0.0, 0.0);
        }
        let cfg = &self.config;
        let (dx, dy) = input.displacement;

        let mut horizontal = 0.0;
        if input.frame.width > 0 {
            #[allow(clippy::cast_precision_loss)]
            let width = input.frame.width as f64;
            horizontal += cfg.horizontal_weight * dx / width;
            #[allow(clippy::float_cmp)]
            if dx == 0.0 {
                horizontal -= cfg.stagnation_penalty;
            }
        }

        let mut vertical = 0.0;
        if input.frame.height > 0 {
            // screen y grows downward, so moving up is positive
            #[allow(clippy::cast_precision_loss)]
            let vy = -dy / input.frame.height as f64;
            vertical += cfg.vertical_weight * vy;
            if vy < 0.0 {
                vertical += vy * cfg.downward_penalty;
            }
        }

        (horizontal, vertical)
    }

    fn hud(&self, analyser: &CounterTrendAnalyser, prev: &[String], curr: &[String]) -> (f64, f64) {
        #[allow(clippy::cast_precision_loss)]
        let total = |values: &[i64]| values.iter().map(|&v| v as f64).sum::<f64>();
        let (before, after) = (numeric_values(prev), numeric_values(curr));
        // an unreadable side says nothing about the counters
        let raw_scaled = if before.is_empty() || after.is_empty() || self.config.hud_divisor == 0.0 {
            0.0
        } else {
            let clamp = self.config.hud_clamp;
            let raw = (total(&after) - total(&before)).clamp(-clamp, clamp);
            (raw / self.config.hud_divisor).tanh()
        };
        let weighted_scaled = analyser.reward_delta(prev, curr).tanh();
        (raw_scaled, weighted_scaled)
    }

    fn enemy(&self, prev: &WorldState, next: &WorldState) -> f64 {
        let cfg = &self.config;
        let defeated = match (prev.enemies(), next.enemies()) {
            (Some(before), Some(after)) => before.saturating_sub(after),
            _ => 0,
        };
        let mut reward = cfg.enemy_kill_weight * f64::from(defeated);

        if defeated == 0 {
            if let (Some(p), Some(n)) = (prev.player_pos, next.player_pos) {
                if let (Some(min_prev), Some(min_next)) =
                    (prev.nearest_enemy_distance(p), next.nearest_enemy_distance(n))
                {
                    let threshold = cfg.enemy_proximity_threshold;
                    if threshold > 0.0 && min_prev < threshold {
                        reward -= cfg.close_penalty_weight * (threshold - min_prev) / threshold;
                        let gained = min_next - min_prev;
                        if gained > 0.0 {
                            reward += cfg.enemy_avoid_weight * gained;
                        }
                    }
                }
            }
        }
        reward
    }

    fn collectibles(&self, prev: &WorldState, next: &WorldState) -> f64 {
        let gained = |before: Option<u32>, after: Option<u32>| match (before, after) {
            (Some(b), Some(a)) => f64::from(a.saturating_sub(b)),
            _ => 0.0,
        };
        self.config.coin_weight * gained(prev.coins, next.coins)
            + self.config.powerup_weight * gained(prev.powerups, next.powerups)
    }

    fn life_loss(&self, prev: &[String], curr: &[String]) -> f64 {
        let prev_lives = numeric_values(prev).first().copied();
        let curr_lives = numeric_values(curr).first().copied();
        match (prev_lives, curr_lives) {
            (Some(before), Some(after)) if after < before => -self.config.life_loss_penalty,
            _ => 0.0,
        }
    }

    fn progression(&self, prev: &WorldState, next: &WorldState) -> f64 {
        let cfg = &self.config;
        let mut reward = 0.0;
        if let (Some(before), Some(after)) = (prev.level_progress, next.level_progress) {
            reward += cfg.progression_weight * (after - before);
        }
        if let (Some(before), Some(after)) = (prev.items_collected, next.items_collected) {
            reward += cfg.item_collection_weight * f64::from(after.saturating_sub(before));
        }
        if let (Some(before), Some(after)) = (prev.combo_count, next.combo_count) {
            reward += cfg.combo_bonus * f64::from(after.saturating_sub(before));
        }
        reward
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(x: f64, y: f64) -> WorldState {
        WorldState {
            player_pos: Some((x, y)),
            ..WorldState::default()
        }
    }

    fn input<'a>(
        prev: &'a WorldState,
        next: &'a WorldState,
        analyser: &'a CounterTrendAnalyser,
    ) -> RewardInput<'a> {
        RewardInput {
            prev,
            next,
            hud_before: None,
            hud_after: None,
            analyser,
            frame: FrameShape::new(240, 256),
            displacement: WorldState::displacement(prev, next),
        }
    }

    #[test]
    fn test_forward_step_scenario() {
        let analyser = CounterTrendAnalyser::default();
        let (prev, next) = (at(100.0, 200.0), at(110.0, 200.0));
        let r = RewardModel::default().compute(&input(&prev, &next, &analyser));

        assert_relative_eq!(r.horizontal, 10.0 / 256.0);
        assert_relative_eq!(r.vertical, 0.0);
        assert_relative_eq!(r.total, 10.0 / 256.0 - 0.01, epsilon = 1e-12);
        assert_relative_eq!(r.total, 0.0291, epsilon = 1e-4);
    }

    #[test]
    fn test_life_loss_applied_once() {
        let analyser = CounterTrendAnalyser::default();
        let state = at(50.0, 50.0);
        let before = HudRead::new("3 000100");
        let after = HudRead::new("2 000100");
        let mut inp = input(&state, &state, &analyser);
        inp.hud_before = Some(&before);
        inp.hud_after = Some(&after);

        let r = RewardModel::default().compute(&inp);
        assert_relative_eq!(r.life_loss, -5.0);

        let after = HudRead::new("0 000100");
        inp.hud_after = Some(&after);
        let r = RewardModel::default().compute(&inp);
        assert_relative_eq!(r.life_loss, -5.0);
    }

    #[test]
    fn test_stagnation_and_downward_penalty() {
        let analyser = CounterTrendAnalyser::default();
        let (prev, next) = (at(100.0, 100.0), at(100.0, 124.0));
        let r = RewardModel::default().compute(&input(&prev, &next, &analyser));

        assert_relative_eq!(r.horizontal, -0.02);
        let vy = -24.0 / 240.0;
        assert_relative_eq!(r.vertical, 0.3 * vy + 0.2 * vy);
    }

    #[test]
    fn test_upward_movement_rewarded() {
        let analyser = CounterTrendAnalyser::default();
        let (prev, next) = (at(100.0, 100.0), at(105.0, 76.0));
        let r = RewardModel::default().compute(&input(&prev, &next, &analyser));
        assert_relative_eq!(r.vertical, 0.3 * 24.0 / 240.0);
    }

    #[test]
    fn test_missing_fields_contribute_nothing() {
        let analyser = CounterTrendAnalyser::default();
        let prev = WorldState {
            coins: Some(3),
            enemy_count: Some(4),
            ..WorldState::default()
        };
        let next = WorldState::default();
        let r = RewardModel::default().compute(&input(&prev, &next, &analyser));

        assert_relative_eq!(r.horizontal, 0.0);
        assert_relative_eq!(r.enemy, 0.0);
        assert_relative_eq!(r.collectibles, 0.0);
        assert_relative_eq!(r.total, -0.01);
    }

    #[test]
    fn test_hud_terms_are_compressed() {
        let mut analyser = CounterTrendAnalyser::default();
        analyser.update(&["1", "100"]);
        analyser.update(&["1", "300"]);

        let state = WorldState::default();
        let before = HudRead::new("1 300");
        let after = HudRead::new("1 800");
        let mut inp = input(&state, &state, &analyser);
        inp.hud_before = Some(&before);
        inp.hud_after = Some(&after);

        let r = RewardModel::default().compute(&inp);
        assert_relative_eq!(r.hud_raw, (100.0_f64 / 10.0).tanh());
        assert_relative_eq!(r.hud_weighted, 500.0_f64.tanh());
        assert!(r.hud_raw <= 1.0 && r.hud_weighted <= 1.0);
    }

    #[test]
    fn test_missing_hud_side_gives_no_counter_signal() {
        let analyser = CounterTrendAnalyser::default();
        let state = at(50.0, 50.0);
        let after = HudRead::new("3 000100");
        let blank = HudRead::new("");
        let model = RewardModel::default();

        let mut inp = input(&state, &state, &analyser);
        inp.hud_after = Some(&after);
        let r = model.compute(&inp);
        assert_relative_eq!(r.hud_raw, 0.0);
        assert_relative_eq!(r.hud_weighted, 0.0);
        assert_relative_eq!(r.total, -0.02 - 0.01);

        inp.hud_before = Some(&blank);
        let r = model.compute(&inp);
        assert_relative_eq!(r.hud_raw, 0.0);
        assert_relative_eq!(r.total, -0.02 - 0.01);

        inp.hud_before = Some(&after);
        inp.hud_after = Some(&blank);
        assert_relative_eq!(model.compute(&inp).hud_raw, 0.0);
    }

    #[test]
    fn test_movement_uses_caller_displacement() {
        let analyser = CounterTrendAnalyser::default();
        let (prev, next) = (at(100.0, 100.0), at(100.0, 100.0));
        let mut inp = input(&prev, &next, &analyser);
        inp.displacement = (16.0, -24.0);

        let r = RewardModel::default().compute(&inp);
        assert_relative_eq!(r.horizontal, 16.0 / 256.0);
        assert_relative_eq!(r.vertical, 0.3 * 24.0 / 240.0);

        // no positions, no movement signal whatever the caller measured
        let empty = WorldState::default();
        let mut inp = input(&empty, &empty, &analyser);
        inp.displacement = (16.0, -24.0);
        let r = RewardModel::default().compute(&inp);
        assert_relative_eq!(r.horizontal, 0.0);
        assert_relative_eq!(r.vertical, 0.0);
    }

    #[test]
    fn test_enemy_defeat() {
        let analyser = CounterTrendAnalyser::default();
        let prev = WorldState {
            enemy_positions: Some(vec![(10.0, 10.0), (200.0, 10.0)]),
            ..at(0.0, 0.0)
        };
        let next = WorldState {
            enemy_positions: Some(vec![(200.0, 10.0)]),
            ..at(0.0, 0.0)
        };
        let r = RewardModel::default().compute(&input(&prev, &next, &analyser));
        assert_relative_eq!(r.enemy, 0.6);
    }

    #[test]
    fn test_proximity_penalty_and_avoidance_bonus() {
        let analyser = CounterTrendAnalyser::default();
        let prev = WorldState {
            enemy_positions: Some(vec![(130.0, 100.0)]),
            ..at(100.0, 100.0)
        };
        let next = WorldState {
            enemy_positions: Some(vec![(130.0, 100.0)]),
            ..at(90.0, 100.0)
        };
        let r = RewardModel::default().compute(&input(&prev, &next, &analyser));
        // 30px away (20 inside the threshold), then 40px away
        assert_relative_eq!(r.enemy, -0.2 * 20.0 / 50.0 + 0.5 * 10.0);

        let far = WorldState {
            enemy_positions: Some(vec![(300.0, 100.0)]),
            ..at(100.0, 100.0)
        };
        let r = RewardModel::default().compute(&input(&far, &far, &analyser));
        assert_relative_eq!(r.enemy, 0.0);
    }

    #[test]
    fn test_collectibles_floor_at_zero() {
        let analyser = CounterTrendAnalyser::default();
        let prev = WorldState {
            coins: Some(5),
            powerups: Some(1),
            ..WorldState::default()
        };
        let gained = WorldState {
            coins: Some(7),
            powerups: Some(2),
            ..WorldState::default()
        };
        let lost = WorldState {
            coins: Some(0),
            powerups: Some(0),
            ..WorldState::default()
        };
        let model = RewardModel::default();
        assert_relative_eq!(model.compute(&input(&prev, &gained, &analyser)).collectibles, 0.6 + 0.7);
        assert_relative_eq!(model.compute(&input(&prev, &lost, &analyser)).collectibles, 0.0);
    }

    #[test]
    fn test_progression_terms() {
        let analyser = CounterTrendAnalyser::default();
        let prev = WorldState {
            level_progress: Some(0.5),
            items_collected: Some(4),
            combo_count: Some(3),
            ..WorldState::default()
        };
        let next = WorldState {
            level_progress: Some(0.25),
            items_collected: Some(2),
            combo_count: Some(5),
            ..WorldState::default()
        };
        let r = RewardModel::default().compute(&input(&prev, &next, &analyser));
        assert_relative_eq!(r.progression, -0.25 + 0.0 + 0.4);
    }

    #[test]
    fn test_squash_and_determinism() {
        let analyser = CounterTrendAnalyser::default();
        let prev = WorldState {
            coins: Some(0),
            ..at(0.0, 0.0)
        };
        let next = WorldState {
            coins: Some(40),
            ..at(0.0, 0.0)
        };
        let plain = RewardModel::default();
        let squashed = RewardModel::new(RewardConfig {
            squash: true,
            ..RewardConfig::default()
        });

        let a = plain.compute(&input(&prev, &next, &analyser));
        let b = plain.compute(&input(&prev, &next, &analyser));
        assert_eq!(a, b);
        assert!(a.total > 1.0);

        let s = squashed.compute(&input(&prev, &next, &analyser));
        assert_relative_eq!(s.total, a.total.tanh());
        assert!(s.total < 1.0);
    }

    #[test]
    fn test_non_finite_positions_are_ignored() {
        let analyser = CounterTrendAnalyser::default();
        let (prev, next) = (at(f64::NAN, 0.0), at(10.0, 0.0));
        let r = RewardModel::default().compute(&input(&prev, &next, &analyser));
        assert!(r.total.is_finite());
        assert_relative_eq!(r.horizontal, 0.0);
    }
}
