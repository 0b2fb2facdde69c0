//! Durable sync state: the newest `updatedAt` known to be mirrored, plus
//! how long each failing issue has been holding it back.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Contents of `state.json`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Issue id → consecutive runs in which it failed while at or past the watermark.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, u32>,
}

pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored state. A missing file means an empty one; a corrupt one is an error.
    pub fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            return Ok(SyncState::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Corrupt state file {}", self.path.display()))
    }

    /// Persist `next`. The watermark never moves backwards: an older
    /// `last_synced_at` keeps the stored one. Returns true if the mark advanced.
    pub fn commit(&self, mut next: SyncState) -> Result<bool> {
        let current = self.load()?;
        let advanced = match (current.last_synced_at, next.last_synced_at) {
            (Some(cur), Some(new)) => new > cur,
            (None, Some(_)) => true,
            (_, None) => false,
        };
        if !advanced {
            next.last_synced_at = current.last_synced_at;
        }
        if next != current {
            self.save(&next)?;
        }
        Ok(advanced)
    }

    fn save(&self, data: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// Pick the fetch cutoff: an explicit `--since`, else the stored watermark,
/// else `now - window`.
pub fn resolve_cutoff(
    explicit: Option<DateTime<Utc>>,
    watermark: Option<DateTime<Utc>>,
    window: Duration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    explicit.or(watermark).unwrap_or(now - window)
}
