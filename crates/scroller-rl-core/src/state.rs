//! Structured world-state snapshots produced by perception

use serde::{Deserialize, Serialize};

/// Pixel position (x grows right, y grows down)
pub type Position = (f64, f64);

/// One perceived snapshot of the game world.
///
/// Every field is optional: `None` means perception could not tell, which is
/// different from a zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Player centre
    pub player_pos: Option<Position>,
    /// Centres of detected enemies
    pub enemy_positions: Option<Vec<Position>>,
    /// Enemy count when reported separately from positions
    pub enemy_count: Option<u32>,
    /// Coin counter
    pub coins: Option<u32>,
    /// Power-up counter
    pub powerups: Option<u32>,
    /// Generic collected-items counter
    pub items_collected: Option<u32>,
    /// Level or mission progress scalar
    pub level_progress: Option<f64>,
    /// Combo counter
    pub combo_count: Option<u32>,
}

impl WorldState {
    /// Snapshot with nothing observed
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no field was observed (a transient observation failure)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Enemy count, from the explicit counter or else the position list
    #[must_use]
    pub fn enemies(&self) -> Option<u32> {
        self.enemy_count.or_else(|| {
            self.enemy_positions
                .as_ref()
                .map(|p| u32::try_from(p.len()).unwrap_or(u32::MAX))
        })
    }

    /// Distance from `from` to the nearest enemy, if any enemy was seen
    #[must_use]
    pub fn nearest_enemy_distance(&self, from: Position) -> Option<f64> {
        self.enemy_positions
            .as_ref()?
            .iter()
            .map(|&(ex, ey)| (from.0 - ex).hypot(from.1 - ey))
            .min_by(f64::total_cmp)
    }

    /// Player displacement between two snapshots; zero when either is unknown
    #[must_use]
    pub fn displacement(prev: &Self, next: &Self) -> (f64, f64) {
        match (prev.player_pos, next.player_pos) {
            (Some(p), Some(n)) => (n.0 - p.0, n.1 - p.1),
            _ => (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        assert!(WorldState::empty().is_empty());
        let state = WorldState {
            coins: Some(0),
            ..WorldState::default()
        };
        assert!(!state.is_empty());
    }

    #[test]
    fn test_enemy_count_prefers_explicit_counter() {
        let state = WorldState {
            enemy_positions: Some(vec![(1.0, 1.0), (2.0, 2.0)]),
            enemy_count: Some(5),
            ..WorldState::default()
        };
        assert_eq!(state.enemies(), Some(5));

        let state = WorldState {
            enemy_positions: Some(vec![(1.0, 1.0)]),
            ..WorldState::default()
        };
        assert_eq!(state.enemies(), Some(1));
        assert_eq!(WorldState::default().enemies(), None);
    }

    #[test]
    fn test_nearest_enemy() {
        let state = WorldState {
            enemy_positions: Some(vec![(10.0, 0.0), (3.0, 4.0)]),
            ..WorldState::default()
        };
        assert_eq!(state.nearest_enemy_distance((0.0, 0.0)), Some(5.0));
        let none = WorldState {
            enemy_positions: Some(Vec::new()),
            ..WorldState::default()
        };
        assert_eq!(none.nearest_enemy_distance((0.0, 0.0)), None);
    }

    #[test]
    fn test_displacement() {
        let prev = WorldState {
            player_pos: Some((100.0, 200.0)),
            ..WorldState::default()
        };
        let next = WorldState {
            player_pos: Some((110.0, 195.0)),
            ..WorldState::default()
        };
        assert_eq!(WorldState::displacement(&prev, &next), (10.0, -5.0));
        assert_eq!(WorldState::displacement(&prev, &WorldState::empty()), (0.0, 0.0));
    }
}
