//! Curriculum ε-greedy bandit policy
//!
//! Each call to [`CurriculumPolicy::choose`] goes through these stages:
//! 1. advance the curriculum (singles at episode 1, the combination power set
//!    once the basic phase is over)
//! 2. on the discourage cadence, mark near-zero single-symbol actions
//! 3. with a small probability, return the best-valued action outright
//! 4. otherwise sample (random with probability ε, value-weighted otherwise)
//!    until a candidate passes the discouraged and late-run filters

use indexmap::IndexSet;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use scroller_rl_core::{
    combinations, singles, ActionId, ActionUniverse, RLError, Result, RewardMemory, Symbol,
};

use crate::utils::{proportional, softmax, EpsilonSchedule};

/// Tunables of the curriculum policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Initial exploration rate
    pub epsilon_start: f64,
    /// Multiplicative decay per step
    pub epsilon_decay: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Probability of returning the best-valued action outright
    pub forward_bias: f64,
    /// Symbols the curriculum builds actions from
    pub basic_symbols: Vec<Symbol>,
    /// Episodes spent on single-symbol actions before expanding
    pub basic_phase: u64,
    /// Largest combination size in the full phase
    pub max_combo: usize,
    /// Softmax exploitation instead of value-proportional sampling
    pub use_softmax: bool,
    /// Softmax temperature
    pub softmax_temperature: f64,
    /// Symbol whose actions get a bonus in proportional sampling
    pub favoured_symbol: Symbol,
    /// Multiplicative bonus for the favoured symbol
    pub favoured_bonus: f64,
    /// Episode cadence of the discourage sweep
    pub discourage_every: u64,
    /// Single-symbol actions with |value| below this get discouraged
    pub discourage_threshold: f64,
    /// Bad-streak length at which discouraged actions are allowed again
    pub bad_streak_escape: u32,
    /// Episode after which purely defensive actions are redrawn
    pub late_run_episode: u64,
    /// Symbols considered defensive by the late-run guard
    pub defensive_symbols: Vec<Symbol>,
    /// Candidate draws before the last one is accepted regardless
    pub max_resample: u32,
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            epsilon_start: 0.9,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            forward_bias: 0.05,
            basic_symbols: Symbol::BASIC.to_vec(),
            basic_phase: 100,
            max_combo: 2,
            use_softmax: true,
            softmax_temperature: 1.0,
            favoured_symbol: Symbol::Up,
            favoured_bonus: 1.1,
            discourage_every: 10,
            discourage_threshold: 0.01,
            bad_streak_escape: 4,
            late_run_episode: 300,
            defensive_symbols: vec![Symbol::Up, Symbol::Down, Symbol::Left, Symbol::Shift],
            max_resample: 64,
            seed: None,
        }
    }
}

impl PolicyConfig {
    /// Reject settings the policy cannot run with
    pub fn validate(&self) -> Result<()> {
        let probability = |name: &str, p: f64| {
            if (0.0..=1.0).contains(&p) {
                Ok(())
            } else {
                Err(RLError::InvalidConfig(format!("{name} must be within [0, 1], got {p}")))
            }
        };
        probability("epsilon_start", self.epsilon_start)?;
        probability("epsilon_decay", self.epsilon_decay)?;
        probability("epsilon_min", self.epsilon_min)?;
        probability("forward_bias", self.forward_bias)?;

        if self.basic_symbols.is_empty() {
            return Err(RLError::InvalidConfig("basic_symbols must not be empty".into()));
        }
        if self.max_combo == 0 {
            return Err(RLError::InvalidConfig("max_combo must be at least 1".into()));
        }
        if !(self.softmax_temperature > 0.0 && self.softmax_temperature.is_finite()) {
            return Err(RLError::InvalidConfig(format!(
                "softmax_temperature must be positive, got {}",
                self.softmax_temperature
            )));
        }
        if self.discourage_every == 0 {
            return Err(RLError::InvalidConfig("discourage_every must be at least 1".into()));
        }
        if self.max_resample == 0 {
            return Err(RLError::InvalidConfig("max_resample must be at least 1".into()));
        }
        Ok(())
    }
}

/// Stage of the action curriculum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurriculumPhase {
    /// Before the first transition
    Initial,
    /// Single-symbol actions only
    Basic,
    /// Every combination up to `max_combo`
    Full,
}

/// ε-greedy bandit policy over a growing action universe
#[derive(Debug)]
pub struct CurriculumPolicy {
    config: PolicyConfig,
    epsilon: EpsilonSchedule,
    phase: CurriculumPhase,
    discouraged: IndexSet<ActionId>,
    rng: StdRng,
}

impl CurriculumPolicy {
    /// Create a policy; fails on an invalid configuration
    pub fn new(config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            epsilon: EpsilonSchedule::new(
                config.epsilon_start,
                config.epsilon_decay,
                config.epsilon_min,
            ),
            phase: CurriculumPhase::Initial,
            discouraged: IndexSet::new(),
            rng,
            config,
        })
    }

    /// Universe to start a run with: the single-symbol actions
    pub fn initial_universe(&self) -> Result<ActionUniverse> {
        ActionUniverse::new(singles(&self.config.basic_symbols))
    }

    /// Pick the next action.
    pub fn choose(
        &mut self,
        episode: u64,
        bad_streak: u32,
        memory: &RewardMemory,
        universe: &mut ActionUniverse,
    ) -> ActionId {
        self.advance_curriculum(episode, universe);
        if episode % self.config.discourage_every == 0 {
            self.discourage_flat_singles(episode, memory);
        }

        if !memory.is_empty() && self.rng.gen::<f64>() < self.config.forward_bias {
            if let Some(best) = best_allowed(memory, universe) {
                tracing::debug!(episode, action = %best, "Forward bias picked best action");
                return best;
            }
        }

        let allow_discouraged = bad_streak >= self.config.bad_streak_escape;
        let late_run = episode > self.config.late_run_episode;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let explore = memory.is_empty() || self.rng.gen::<f64>() < self.epsilon.value();
            let mut candidate = if explore {
                universe.draw(&mut self.rng)
            } else {
                exploit(&self.config, &self.discouraged, memory, universe, &mut self.rng)
                    .unwrap_or_else(|| universe.draw(&mut self.rng))
            };

            if late_run && candidate.is_subset_of(&self.config.defensive_symbols) {
                candidate = universe.draw(&mut self.rng);
            }

            if allow_discouraged || !self.discouraged.contains(&candidate) {
                return candidate;
            }
            if attempts >= self.config.max_resample {
                tracing::debug!(episode, attempts, action = %candidate, "Accepting discouraged action after resample cap");
                return candidate;
            }
        }
    }

    fn advance_curriculum(&mut self, episode: u64, universe: &mut ActionUniverse) {
        if self.phase == CurriculumPhase::Initial && episode >= 1 {
            self.replace_universe(universe, singles(&self.config.basic_symbols), CurriculumPhase::Basic, episode);
        }
        if self.phase == CurriculumPhase::Basic && episode > self.config.basic_phase {
            let actions = combinations(&self.config.basic_symbols, self.config.max_combo);
            self.replace_universe(universe, actions, CurriculumPhase::Full, episode);
        }
    }

    fn replace_universe(
        &mut self,
        universe: &mut ActionUniverse,
        actions: Vec<ActionId>,
        phase: CurriculumPhase,
        episode: u64,
    ) {
        let size = actions.len();
        match universe.set(actions) {
            Ok(()) => {
                tracing::info!(episode, ?phase, actions = size, "Curriculum advanced");
            }
            Err(e) => {
                tracing::warn!(episode, ?phase, error = %e, "Curriculum transition skipped");
            }
        }
        self.phase = phase;
    }

    fn discourage_flat_singles(&mut self, episode: u64, memory: &RewardMemory) {
        let before = self.discouraged.len();
        for (action, value) in memory.iter() {
            if action.is_single() && value.abs() < self.config.discourage_threshold {
                self.discouraged.insert(action.clone());
            }
        }
        let added = self.discouraged.len() - before;
        if added > 0 {
            tracing::info!(
                episode,
                added,
                total = self.discouraged.len(),
                "Discouraged low-impact single actions"
            );
        }
    }

    /// Apply one ε decay and return the new value
    pub fn decay_epsilon(&mut self) -> f64 {
        self.epsilon.decay()
    }

    /// Current exploration rate
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon.value()
    }

    /// Current curriculum stage
    #[must_use]
    pub fn phase(&self) -> CurriculumPhase {
        self.phase
    }

    /// Actions currently avoided unless the bad streak escape is active
    #[must_use]
    pub fn discouraged(&self) -> &IndexSet<ActionId> {
        &self.discouraged
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}

/// Highest-valued action that is not blacklisted; ties keep first-seen order
fn best_allowed(memory: &RewardMemory, universe: &ActionUniverse) -> Option<ActionId> {
    let mut best: Option<(&ActionId, f64)> = None;
    for (action, value) in memory.iter() {
        if universe.is_blacklisted(action) {
            continue;
        }
        if best.map_or(true, |(_, v)| value > v) {
            best = Some((action, value));
        }
    }
    best.map(|(a, _)| a.clone())
}

/// Value-weighted draw among positive, allowed actions
fn exploit<R: Rng>(
    config: &PolicyConfig,
    discouraged: &IndexSet<ActionId>,
    memory: &RewardMemory,
    universe: &ActionUniverse,
    rng: &mut R,
) -> Option<ActionId> {
    let (good, values): (Vec<&ActionId>, Vec<f64>) = memory
        .iter()
        .filter(|(a, v)| *v > 0.0 && !discouraged.contains(*a) && !universe.is_blacklisted(a))
        .unzip();
    if good.is_empty() {
        return None;
    }

    let weights = if config.use_softmax {
        softmax(&values, config.softmax_temperature)
    } else {
        let favoured: Vec<bool> = good
            .iter()
            .map(|a| a.contains(config.favoured_symbol))
            .collect();
        proportional(&values, &favoured, config.favoured_bonus)
    };

    let dist = WeightedIndex::new(&weights).ok()?;
    Some(good[dist.sample(rng)].clone())
}
