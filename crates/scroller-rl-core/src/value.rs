//! Reward memory: the persistent per-action value table

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ActionId, RLError, Result};

/// Default location of the persisted table
pub const DEFAULT_MEMORY_PATH: &str = "data/memory.json";

const FORMAT_VERSION: u32 = 1;

/// Blending parameters for the value table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Exponential smoothing factor applied to new samples
    pub alpha: f64,
    /// Samples are clipped to `[-clip, clip]` before blending
    pub clip: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            clip: 10.0,
        }
    }
}

/// On-disk layout of the table
#[derive(Debug, Serialize, Deserialize)]
struct PersistedMemory {
    version: u32,
    saved_at: DateTime<Utc>,
    values: IndexMap<String, f64>,
    #[serde(default)]
    usage: IndexMap<String, u64>,
}

/// Smoothed value per action, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct RewardMemory {
    values: IndexMap<ActionId, f64>,
    usage: IndexMap<ActionId, u64>,
    config: MemoryConfig,
}

impl RewardMemory {
    /// Empty table with default blending
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table with explicit blending parameters
    #[must_use]
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            values: IndexMap::new(),
            usage: IndexMap::new(),
            config,
        }
    }

    /// Blend a raw reward into the value of `action` and return the new value.
    ///
    /// The sample is clipped first; the first sample becomes the initial value.
    pub fn update(&mut self, action: &ActionId, raw_reward: f64) -> f64 {
        if raw_reward.is_nan() {
            tracing::warn!(action = %action, "Ignoring NaN reward sample");
            return self.value(action).unwrap_or(0.0);
        }
        let clip = self.config.clip;
        let alpha = self.config.alpha;
        let clipped = raw_reward.clamp(-clip, clip);
        let value = match self.values.get(action) {
            Some(&old) => old * (1.0 - alpha) + clipped * alpha,
            None => clipped,
        };
        self.values.insert(action.clone(), value);
        *self.usage.entry(action.clone()).or_insert(0) += 1;
        value
    }

    /// Current value of `action`, if it has ever been updated
    #[must_use]
    pub fn value(&self, action: &ActionId) -> Option<f64> {
        self.values.get(action).copied()
    }

    /// Number of updates recorded for `action`
    #[must_use]
    pub fn usage(&self, action: &ActionId) -> u64 {
        self.usage.get(action).copied().unwrap_or(0)
    }

    /// The `n` highest-valued actions; ties keep first-seen order
    #[must_use]
    pub fn get_best(&self, n: usize) -> Vec<ActionId> {
        self.leaderboard(n).into_iter().map(|(a, _)| a).collect()
    }

    /// The single highest-valued action
    #[must_use]
    pub fn best(&self) -> Option<&ActionId> {
        let mut best: Option<(&ActionId, f64)> = None;
        for (action, &value) in &self.values {
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((action, value));
            }
        }
        best.map(|(a, _)| a)
    }

    /// The `n` highest-valued actions together with their values
    #[must_use]
    pub fn leaderboard(&self, n: usize) -> Vec<(ActionId, f64)> {
        let mut entries: Vec<(&ActionId, f64)> =
            self.values.iter().map(|(a, &v)| (a, v)).collect();
        // stable sort keeps insertion order among equal values
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        entries
            .into_iter()
            .take(n)
            .map(|(a, v)| (a.clone(), v))
            .collect()
    }

    /// Iterate `(action, value)` in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&ActionId, f64)> {
        self.values.iter().map(|(a, &v)| (a, v))
    }

    /// Number of actions with a value
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing has been learned yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Blending parameters in use
    #[must_use]
    pub fn config(&self) -> MemoryConfig {
        self.config
    }

    /// Persist the table to `path`.
    ///
    /// The record is written to a sibling temporary file, flushed and synced,
    /// then renamed over `path`, so readers never see a partial table.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RLError::storage(parent, e))?;
        }

        let record = PersistedMemory {
            version: FORMAT_VERSION,
            saved_at: Utc::now(),
            values: self
                .values
                .iter()
                .map(|(a, &v)| (a.as_key().to_string(), v))
                .collect(),
            usage: self
                .usage
                .iter()
                .map(|(a, &n)| (a.as_key().to_string(), n))
                .collect(),
        };

        let tmp = temp_path(path);
        let written = write_record(&tmp, &record);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            RLError::storage(path, e)
        })?;

        tracing::debug!(path = %path.display(), entries = self.len(), "Saved reward memory");
        Ok(())
    }

    /// Restore a table from `path`.
    ///
    /// A missing or unreadable store yields an empty table: corruption only
    /// forfeits prior learning.
    #[must_use]
    pub fn load(path: impl AsRef<Path>, config: MemoryConfig) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No reward memory found, starting fresh");
            return Self::with_config(config);
        }
        match Self::try_load(path, config) {
            Ok(memory) => {
                tracing::info!(
                    path = %path.display(),
                    entries = memory.len(),
                    "Loaded reward memory"
                );
                memory
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Reward memory unreadable, discarding it"
                );
                Self::with_config(config)
            }
        }
    }

    fn try_load(path: &Path, config: MemoryConfig) -> Result<Self> {
        let file = File::open(path).map_err(|e| RLError::storage(path, e))?;
        let record: PersistedMemory = serde_json::from_reader(BufReader::new(file))?;
        if record.version != FORMAT_VERSION {
            return Err(RLError::InvalidConfig(format!(
                "unsupported reward memory version {}",
                record.version
            )));
        }

        let mut memory = Self::with_config(config);
        for (key, value) in record.values {
            let action = match key.parse::<ActionId>() {
                Ok(action) => action,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping unknown action in reward memory");
                    continue;
                }
            };
            if !value.is_finite() {
                tracing::warn!(key = %key, "Skipping non-finite value in reward memory");
                continue;
            }
            let uses = record.usage.get(&key).copied().unwrap_or(0);
            memory.values.insert(action.clone(), value);
            if uses > 0 {
                memory.usage.insert(action, uses);
            }
        }
        Ok(memory)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_record(tmp: &Path, record: &PersistedMemory) -> Result<()> {
    let file = File::create(tmp).map_err(|e| RLError::storage(tmp, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, record)?;
    writer.flush().map_err(|e| RLError::storage(tmp, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| RLError::storage(tmp, e.into_error()))?;
    file.sync_all().map_err(|e| RLError::storage(tmp, e))?;
    Ok(())
}
