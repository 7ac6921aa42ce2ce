//! Online direction/weight learning for unlabeled HUD counters

use std::collections::VecDeque;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default number of accepted HUD observations kept
pub const DEFAULT_HISTORY_LEN: usize = 10;

/// Smallest history that can show a trend
pub const MIN_HISTORY_LEN: usize = 2;

/// Key of a HUD slot: its position, or a caller-supplied name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotKey {
    /// Position in the numeric vector
    Index(usize),
    /// Semantic name supplied at construction
    Named(String),
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Learned trend of one slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotTrend {
    /// +1 when increases dominate (ties included), else -1
    pub direction: i8,
    /// Net directional consistency in `[-1, 1]`
    pub weight: f64,
}

impl SlotTrend {
    /// Trend used for slots without enough history
    pub const NEUTRAL: SlotTrend = SlotTrend {
        direction: 1,
        weight: 0.0,
    };
}

/// True for non-empty all-ASCII-digit tokens
#[must_use]
pub fn is_numeric_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Numeric tokens in original order, duplicates preserved
pub fn numeric_tokens<S: AsRef<str>>(tokens: &[S]) -> Vec<&str> {
    tokens
        .iter()
        .map(|t| t.as_ref())
        .filter(|t| is_numeric_token(t))
        .filter(|t| t.parse::<i64>().is_ok())
        .collect()
}

/// Parsed numeric values of `tokens`
pub fn numeric_values<S: AsRef<str>>(tokens: &[S]) -> Vec<i64> {
    numeric_tokens(tokens)
        .into_iter()
        .filter_map(|t| t.parse().ok())
        .collect()
}

/// Learns, per HUD slot, whether increases are good and how consistently.
///
/// The slot count is fixed by the first accepted observation (or by the
/// supplied slot names); later reads with a different count are dropped.
#[derive(Debug, Clone)]
pub struct CounterTrendAnalyser {
    history: VecDeque<Vec<i64>>,
    capacity: usize,
    slot_names: Option<Vec<String>>,
    expected_len: Option<usize>,
    last_accepted: Option<Vec<String>>,
    slots: IndexMap<SlotKey, SlotTrend>,
}

impl Default for CounterTrendAnalyser {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl CounterTrendAnalyser {
    /// Analyser keeping `capacity` observations, slots keyed by index.
    ///
    /// A trend needs two observations, so capacities below 2 are raised to 2.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_HISTORY_LEN);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            slot_names: None,
            expected_len: None,
            last_accepted: None,
            slots: IndexMap::new(),
        }
    }

    /// Analyser with named slots; the name count fixes the slot count
    #[must_use]
    pub fn with_slot_names(capacity: usize, names: Vec<String>) -> Self {
        let mut analyser = Self::new(capacity);
        analyser.expected_len = Some(names.len());
        analyser.slot_names = Some(names);
        analyser
    }

    /// Feed one HUD read. Returns whether the observation entered history.
    pub fn update<S: AsRef<str>>(&mut self, tokens: &[S]) -> bool {
        let numeric = numeric_tokens(tokens);
        if numeric.is_empty() {
            return false;
        }
        if self
            .last_accepted
            .as_ref()
            .is_some_and(|last| last.iter().map(String::as_str).eq(numeric.iter().copied()))
        {
            return false;
        }

        match self.expected_len {
            None => self.expected_len = Some(numeric.len()),
            Some(expected) if expected != numeric.len() => {
                tracing::trace!(expected, got = numeric.len(), "Dropping HUD read with mismatched slot count");
                return false;
            }
            Some(_) => {}
        }

        let values: Vec<i64> = numeric.iter().filter_map(|t| t.parse().ok()).collect();
        self.last_accepted = Some(numeric.iter().map(|t| (*t).to_string()).collect());
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(values);

        if self.history.len() >= 2 {
            self.recompute();
        }
        true
    }

    fn recompute(&mut self) {
        let slots = self.expected_len.unwrap_or(0);
        let transitions = self.history.len() - 1;
        let mut info = IndexMap::with_capacity(slots);

        for slot in 0..slots {
            let (mut pos, mut neg) = (0usize, 0usize);
            for (prev, next) in self.history.iter().zip(self.history.iter().skip(1)) {
                match next[slot].cmp(&prev[slot]) {
                    std::cmp::Ordering::Greater => pos += 1,
                    std::cmp::Ordering::Less => neg += 1,
                    std::cmp::Ordering::Equal => {}
                }
            }
            let direction = if pos >= neg { 1 } else { -1 };
            #[allow(clippy::cast_precision_loss)]
            let weight = (pos as f64 - neg as f64) / transitions as f64;
            info.insert(self.slot_key(slot), SlotTrend { direction, weight });
        }

        self.slots = info;
    }

    fn slot_key(&self, index: usize) -> SlotKey {
        match self.slot_names.as_ref().and_then(|names| names.get(index)) {
            Some(name) => SlotKey::Named(name.clone()),
            None => SlotKey::Index(index),
        }
    }

    /// Trend-weighted change between two HUD reads. Does not touch history.
    ///
    /// Slots are paired by position up to the shorter read; slots without a
    /// learned trend contribute nothing.
    #[must_use]
    pub fn reward_delta<S: AsRef<str>>(&self, prev_tokens: &[S], curr_tokens: &[S]) -> f64 {
        let prev = numeric_values(prev_tokens);
        let curr = numeric_values(curr_tokens);
        prev.iter()
            .zip(&curr)
            .enumerate()
            .map(|(i, (&p, &c))| {
                let trend = self.trend(&self.slot_key(i));
                #[allow(clippy::cast_precision_loss)]
                let delta = c.saturating_sub(p) as f64;
                f64::from(trend.direction) * trend.weight * delta
            })
            .sum()
    }

    /// Learned trend of `slot`, or the neutral default
    #[must_use]
    pub fn trend(&self, slot: &SlotKey) -> SlotTrend {
        self.slots.get(slot).copied().unwrap_or(SlotTrend::NEUTRAL)
    }

    /// Current trend table
    #[must_use]
    pub fn slot_info(&self) -> &IndexMap<SlotKey, SlotTrend> {
        &self.slots
    }

    /// Accepted observations, oldest first
    pub fn history(&self) -> impl Iterator<Item = &[i64]> {
        self.history.iter().map(Vec::as_slice)
    }

    /// Number of accepted observations held
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Slot count, once fixed
    #[must_use]
    pub fn expected_len(&self) -> Option<usize> {
        self.expected_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_numeric_extraction() {
        let tokens = ["x", "03", "12a", "", "7", "03"];
        assert_eq!(numeric_tokens(&tokens), vec!["03", "7", "03"]);
        assert_eq!(numeric_values(&tokens), vec![3, 7, 3]);
        assert!(numeric_tokens(&["99999999999999999999999"]).is_empty());
    }

    #[test]
    fn test_single_rising_slot() {
        let mut analyser = CounterTrendAnalyser::default();
        assert!(analyser.update(&["5", "0", "3"]));
        assert!(analyser.update(&["5", "1", "3"]));
        assert!(analyser.update(&["5", "2", "3"]));

        let rising = analyser.trend(&SlotKey::Index(1));
        assert_eq!(rising.direction, 1);
        assert_relative_eq!(rising.weight, 1.0);
        for slot in [0, 2] {
            let flat = analyser.trend(&SlotKey::Index(slot));
            assert_eq!(flat.direction, 1);
            assert_relative_eq!(flat.weight, 0.0);
        }
    }

    #[test]
    fn test_repeated_read_is_idempotent() {
        let mut analyser = CounterTrendAnalyser::default();
        analyser.update(&["1", "9"]);
        analyser.update(&["2", "8"]);
        let info = analyser.slot_info().clone();

        assert!(!analyser.update(&["2", "8"]));
        assert_eq!(analyser.history_len(), 2);
        assert_eq!(analyser.slot_info(), &info);
    }

    #[test]
    fn test_noise_tokens_do_not_defeat_duplicate_check() {
        let mut analyser = CounterTrendAnalyser::default();
        analyser.update(&["3", "100"]);
        assert!(!analyser.update(&["lives", "3", "100"]));
        assert_eq!(analyser.history_len(), 1);
    }

    #[test]
    fn test_mismatched_length_dropped() {
        let mut analyser = CounterTrendAnalyser::default();
        analyser.update(&["1", "2", "3"]);
        assert!(!analyser.update(&["1", "2"]));
        assert!(!analyser.update(&["a", "b"]));
        assert_eq!(analyser.history_len(), 1);
        assert_eq!(analyser.expected_len(), Some(3));
    }

    #[test]
    fn test_falling_slot_and_tie_break() {
        let mut analyser = CounterTrendAnalyser::default();
        for tokens in [["3", "0"], ["2", "1"], ["1", "0"], ["0", "1"]] {
            analyser.update(&tokens);
        }
        let falling = analyser.trend(&SlotKey::Index(0));
        assert_eq!(falling.direction, -1);
        assert_relative_eq!(falling.weight, -1.0);

        // slot 1 alternates up/down/up: 2 up, 1 down
        let mixed = analyser.trend(&SlotKey::Index(1));
        assert_eq!(mixed.direction, 1);
        assert_relative_eq!(mixed.weight, 1.0 / 3.0);
    }

    #[test]
    fn test_history_capacity() {
        let mut analyser = CounterTrendAnalyser::new(3);
        for i in 0..6 {
            analyser.update(&[i.to_string()]);
        }
        assert_eq!(analyser.history_len(), 3);
        let oldest = analyser.history().next().unwrap().to_vec();
        assert_eq!(oldest, vec![3]);
    }

    #[test]
    fn test_tiny_capacity_raised_to_minimum() {
        for capacity in [0, 1] {
            let mut analyser = CounterTrendAnalyser::new(capacity);
            for i in 0..4 {
                analyser.update(&[i.to_string()]);
            }
            assert_eq!(analyser.history_len(), MIN_HISTORY_LEN);
            let kept: Vec<Vec<i64>> = analyser.history().map(<[i64]>::to_vec).collect();
            assert_eq!(kept, vec![vec![2], vec![3]]);
        }
    }

    #[test]
    fn test_named_slots() {
        let names = vec!["lives".to_string(), "score".to_string()];
        let mut analyser = CounterTrendAnalyser::with_slot_names(10, names);
        assert!(!analyser.update(&["1", "2", "3"]));
        analyser.update(&["3", "100"]);
        analyser.update(&["3", "200"]);

        let score = analyser.trend(&SlotKey::Named("score".to_string()));
        assert_relative_eq!(score.weight, 1.0);
        assert!(analyser.slot_info().contains_key(&SlotKey::Named("lives".to_string())));
    }

    #[test]
    fn test_reward_delta_uses_learned_trends() {
        let mut analyser = CounterTrendAnalyser::default();
        // before any trend: neutral weight => zero
        assert_relative_eq!(analyser.reward_delta(&["0", "5"], &["9", "1"]), 0.0);

        analyser.update(&["3", "100"]);
        analyser.update(&["3", "150"]);
        analyser.update(&["3", "170"]);
        let history_before = analyser.history_len();

        // slot 0 flat (weight 0), slot 1 rising (weight 1); extra token ignored
        let delta = analyser.reward_delta(&["3", "170"], &["2", "180", "44"]);
        assert_relative_eq!(delta, 10.0);
        assert_eq!(analyser.history_len(), history_before);
    }

    proptest! {
        #[test]
        fn prop_weights_bounded(reads in proptest::collection::vec(proptest::collection::vec(0u32..50, 3), 2..30)) {
            let mut analyser = CounterTrendAnalyser::default();
            for read in &reads {
                let tokens: Vec<String> = read.iter().map(u32::to_string).collect();
                analyser.update(tokens.as_slice());
            }
            for trend in analyser.slot_info().values() {
                prop_assert!((-1.0..=1.0).contains(&trend.weight));
                prop_assert!(trend.direction == 1 || trend.direction == -1);
                prop_assert_eq!(trend.direction == 1, trend.weight >= 0.0);
            }
        }
    }
}
