//! Input symbols, action identifiers and the action universe

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{RLError, Result};

/// Separator used in the canonical string form of an [`ActionId`]
pub const KEY_SEPARATOR: char = '+';

/// Consecutive no-effect uses after which an action is blacklisted
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// A single input the actuator can hold down.
///
/// Declaration order is the canonical order used when building action keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Shift modifier
    Shift,
    /// Alt / option modifier
    Alt,
    /// Control modifier
    Ctrl,
    /// Space bar
    Space,
    /// Return key
    Enter,
}

impl Symbol {
    /// Symbols used by the basic curriculum phase
    pub const BASIC: [Symbol; 6] = [
        Symbol::Up,
        Symbol::Down,
        Symbol::Left,
        Symbol::Right,
        Symbol::Shift,
        Symbol::Alt,
    ];

    /// Lowercase name used in action keys and by actuators
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Shift => "shift",
            Self::Alt => "alt",
            Self::Ctrl => "ctrl",
            Self::Space => "space",
            Self::Enter => "enter",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = RLError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "shift" => Ok(Self::Shift),
            "alt" | "option" => Ok(Self::Alt),
            "ctrl" | "control" => Ok(Self::Ctrl),
            "space" => Ok(Self::Space),
            "enter" | "return" => Ok(Self::Enter),
            other => Err(RLError::UnknownSymbol(other.to_string())),
        }
    }
}

/// Canonical identifier of a set of symbols held simultaneously.
///
/// Symbols are kept sorted and deduplicated so two identifiers built from the
/// same set in any order compare equal and share the same key string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionId {
    symbols: Vec<Symbol>,
    key: String,
}

impl ActionId {
    /// Build an identifier from a non-empty collection of symbols
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Result<Self> {
        let mut symbols: Vec<Symbol> = symbols.into_iter().collect();
        symbols.sort_unstable();
        symbols.dedup();
        if symbols.is_empty() {
            return Err(RLError::InvalidConfig(
                "an action needs at least one symbol".to_string(),
            ));
        }
        let separator = KEY_SEPARATOR.to_string();
        let key = symbols
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(separator.as_str());
        Ok(Self { symbols, key })
    }

    /// Identifier holding exactly one symbol
    #[must_use]
    pub fn single(symbol: Symbol) -> Self {
        Self {
            symbols: vec![symbol],
            key: symbol.as_str().to_string(),
        }
    }

    /// Symbols in canonical order
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Canonical key string (e.g. `"up+shift"`)
    #[must_use]
    pub fn as_key(&self) -> &str {
        &self.key
    }

    /// Number of symbols held
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// True when the action holds a single symbol
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.symbols.len() == 1
    }

    /// True when `symbol` is part of this action
    #[must_use]
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.symbols.contains(&symbol)
    }

    /// True when every symbol of this action appears in `set`
    #[must_use]
    pub fn is_subset_of(&self, set: &[Symbol]) -> bool {
        self.symbols.iter().all(|s| set.contains(s))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for ActionId {
    type Err = RLError;

    fn from_str(s: &str) -> Result<Self> {
        let symbols = s
            .split(KEY_SEPARATOR)
            .map(str::parse)
            .collect::<Result<Vec<Symbol>>>()?;
        Self::new(symbols)
    }
}

impl TryFrom<String> for ActionId {
    type Error = RLError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ActionId> for String {
    fn from(action: ActionId) -> Self {
        action.key
    }
}

/// All symbol combinations of size `1..=max_size`, smallest first.
///
/// Within one size, combinations follow the order of `symbols`.
#[must_use]
pub fn combinations(symbols: &[Symbol], max_size: usize) -> Vec<ActionId> {
    fn extend(
        symbols: &[Symbol],
        start: usize,
        size: usize,
        current: &mut Vec<Symbol>,
        out: &mut Vec<ActionId>,
    ) {
        if current.len() == size {
            if let Ok(action) = ActionId::new(current.iter().copied()) {
                if !out.contains(&action) {
                    out.push(action);
                }
            }
            return;
        }
        for i in start..symbols.len() {
            current.push(symbols[i]);
            extend(symbols, i + 1, size, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    for size in 1..=max_size.min(symbols.len()) {
        extend(symbols, 0, size, &mut Vec::with_capacity(size), &mut out);
    }
    out
}

/// Single-symbol actions for each of `symbols`
#[must_use]
pub fn singles(symbols: &[Symbol]) -> Vec<ActionId> {
    combinations(symbols, 1)
}

/// The evolving set of candidate actions plus the permanent blacklist.
#[derive(Debug, Clone)]
pub struct ActionUniverse {
    /// Candidates eligible for drawing
    live: Vec<ActionId>,
    /// Last full replacement, used as the draw fallback
    configured: Vec<ActionId>,
    /// Consecutive no-effect count per action
    failures: HashMap<ActionId, u32>,
    /// Irreversibly excluded actions, in blacklisting order
    blacklist: IndexSet<ActionId>,
    failure_threshold: u32,
}

impl ActionUniverse {
    /// Create a universe; fails fast when `actions` is empty
    pub fn new(actions: Vec<ActionId>) -> Result<Self> {
        Self::with_threshold(actions, DEFAULT_FAILURE_THRESHOLD)
    }

    /// Create a universe with a custom blacklist threshold
    pub fn with_threshold(actions: Vec<ActionId>, failure_threshold: u32) -> Result<Self> {
        if actions.is_empty() {
            return Err(RLError::EmptyActionUniverse);
        }
        if failure_threshold == 0 {
            return Err(RLError::InvalidConfig(
                "failure threshold must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            live: actions.clone(),
            configured: actions,
            failures: HashMap::new(),
            blacklist: IndexSet::new(),
            failure_threshold,
        })
    }

    /// Replace the candidate set atomically.
    ///
    /// Blacklisted actions stay excluded from the live set.
    pub fn set(&mut self, actions: Vec<ActionId>) -> Result<()> {
        if actions.is_empty() {
            return Err(RLError::EmptyActionUniverse);
        }
        self.live = actions
            .iter()
            .filter(|a| !self.blacklist.contains(*a))
            .cloned()
            .collect();
        self.configured = actions;
        Ok(())
    }

    /// Remove an action from the live set. Returns whether it was present.
    pub fn remove_permanently(&mut self, action: &ActionId) -> bool {
        let before = self.live.len();
        self.live.retain(|a| a != action);
        before != self.live.len()
    }

    /// Record whether using `action` had a visible effect.
    ///
    /// Returns true when this call blacklisted the action.
    pub fn record_outcome(&mut self, action: &ActionId, effective: bool) -> bool {
        if self.blacklist.contains(action) {
            // counter is frozen once blacklisted
            return false;
        }
        let count = self.failures.entry(action.clone()).or_insert(0);
        if effective {
            *count = 0;
            return false;
        }
        *count += 1;
        if *count < self.failure_threshold {
            return false;
        }
        let count = *count;
        self.blacklist.insert(action.clone());
        self.remove_permanently(action);
        tracing::info!(
            action = %action,
            failures = count,
            "Blacklisting action after repeated no-effect uses"
        );
        true
    }

    /// Draw a uniformly random candidate.
    ///
    /// Blacklisted actions are skipped while any alternative exists; when
    /// none does, the draw falls back to the last configured set.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> ActionId {
        let valid: Vec<&ActionId> = self
            .live
            .iter()
            .filter(|a| !self.blacklist.contains(*a))
            .collect();
        if !valid.is_empty() {
            return valid[rng.gen_range(0..valid.len())].clone();
        }
        tracing::debug!("Every live action is blacklisted, drawing from the configured set");
        // configured is non-empty by construction
        self.configured[rng.gen_range(0..self.configured.len())].clone()
    }

    /// True when the action has been permanently excluded
    #[must_use]
    pub fn is_blacklisted(&self, action: &ActionId) -> bool {
        self.blacklist.contains(action)
    }

    /// Blacklisted actions in the order they were excluded
    pub fn blacklist(&self) -> impl Iterator<Item = &ActionId> {
        self.blacklist.iter()
    }

    /// Current consecutive no-effect count for `action`
    #[must_use]
    pub fn failure_count(&self, action: &ActionId) -> u32 {
        self.failures.get(action).copied().unwrap_or(0)
    }

    /// True when `action` is in the live set
    #[must_use]
    pub fn contains(&self, action: &ActionId) -> bool {
        self.live.contains(action)
    }

    /// Live candidates
    #[must_use]
    pub fn actions(&self) -> &[ActionId] {
        &self.live
    }

    /// Number of live candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// True when no live candidates remain
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
