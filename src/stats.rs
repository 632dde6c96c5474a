//! Append-only detection ledger.
//!
//! Pure counters plus a bounded history; no classification logic. Every call
//! to `record` is a real counted event. The store persists the ledger to a
//! JSON file after each mutation; concurrent writers are not supported, the
//! single continuous-mode producer is the only writer.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use crate::verdict::{FusedResult, Label};

/// History entries kept before oldest-first eviction.
pub const HISTORY_CAP: usize = 1000;

pub const STATUS_OK: &str = "OK";
pub const STATUS_SPOILED: &str = "MALOGRADA";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeBreakdown {
    pub total: u64,
    pub ok: u64,
    pub spoiled: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSummary {
    pub total_detections: u64,
    pub total_fruits: u64,
    pub total_non_fruits: u64,
    pub fruits_by_type: BTreeMap<String, TypeBreakdown>,
    pub fruits_by_status: BTreeMap<String, u64>,
    /// Good fruit over all fruit, recomputed on every fruit record.
    pub success_rate: f64,
}

impl Default for StatsSummary {
    fn default() -> Self {
        let mut fruits_by_status = BTreeMap::new();
        fruits_by_status.insert(STATUS_OK.to_string(), 0);
        fruits_by_status.insert(STATUS_SPOILED.to_string(), 0);
        Self {
            total_detections: 0,
            total_fruits: 0,
            total_non_fruits: 0,
            fruits_by_type: BTreeMap::new(),
            fruits_by_status,
            success_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub classification: String,
    pub confidence: f32,
    pub is_fruit: bool,
    pub fruit_type: String,
    pub spoiled: bool,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionStats {
    pub summary: StatsSummary,
    pub detection_history: VecDeque<HistoryEntry>,
    pub last_updated: DateTime<Utc>,
}

impl Default for DetectionStats {
    fn default() -> Self {
        Self {
            summary: StatsSummary::default(),
            detection_history: VecDeque::new(),
            last_updated: Utc::now(),
        }
    }
}

impl DetectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed classification.
    pub fn record(&mut self, result: &FusedResult) {
        self.summary.total_detections += 1;

        if result.is_fruit() {
            self.summary.total_fruits += 1;

            let spoiled = result.label == Label::Spoiled;
            let type_key = result.species.as_str().to_string();
            let breakdown = self.summary.fruits_by_type.entry(type_key).or_default();
            breakdown.total += 1;
            if spoiled {
                breakdown.spoiled += 1;
            } else {
                breakdown.ok += 1;
            }

            let status = if spoiled { STATUS_SPOILED } else { STATUS_OK };
            *self
                .summary
                .fruits_by_status
                .entry(status.to_string())
                .or_insert(0) += 1;

            let ok = self
                .summary
                .fruits_by_status
                .get(STATUS_OK)
                .copied()
                .unwrap_or(0);
            let bad = self
                .summary
                .fruits_by_status
                .get(STATUS_SPOILED)
                .copied()
                .unwrap_or(0);
            if ok + bad > 0 {
                self.summary.success_rate = ok as f64 / (ok + bad) as f64;
            }
        } else {
            self.summary.total_non_fruits += 1;
        }

        self.detection_history.push_back(HistoryEntry {
            timestamp: result.timestamp,
            classification: result.label.as_str().to_string(),
            confidence: result.confidence,
            is_fruit: result.is_fruit(),
            fruit_type: result.species.as_str().to_string(),
            spoiled: result.is_fruit() && result.label == Label::Spoiled,
            source: result.source.as_str().to_string(),
        });
        while self.detection_history.len() > HISTORY_CAP {
            self.detection_history.pop_front();
        }

        self.last_updated = Utc::now();
    }

    /// Most recent `limit` history entries, newest last.
    pub fn history_tail(&self, limit: usize) -> Vec<&HistoryEntry> {
        let skip = self.detection_history.len().saturating_sub(limit);
        self.detection_history.iter().skip(skip).collect()
    }
}

/// Ledger plus its backing file. When a path is configured, every recorded
/// detection is persisted synchronously from the recording thread.
pub struct StatsStore {
    stats: DetectionStats,
    path: Option<PathBuf>,
}

impl StatsStore {
    /// In-memory only store (tests, one-shot runs without persistence).
    pub fn in_memory() -> Self {
        Self {
            stats: DetectionStats::new(),
            path: None,
        }
    }

    /// Load existing stats from `path`, falling back to an empty ledger when
    /// the file is missing or unreadable.
    pub fn open(path: &Path) -> Self {
        let stats = match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(stats) => stats,
                Err(e) => {
                    log::warn!(
                        "⚠️  Could not parse stats file {}, starting fresh: {e}",
                        path.display()
                    );
                    DetectionStats::new()
                }
            },
            Err(_) => DetectionStats::new(),
        };
        Self {
            stats,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn stats(&self) -> &DetectionStats {
        &self.stats
    }

    pub fn record(&mut self, result: &FusedResult) -> Result<()> {
        self.stats.record(result);
        self.persist()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.stats = DetectionStats::new();
        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        self.stats.last_updated = Utc::now();
        let json = serde_json::to_string_pretty(&self.stats)?;
        fs::write(path, json)
            .with_context(|| format!("writing stats file {}", path.display()))?;
        Ok(())
    }
}
