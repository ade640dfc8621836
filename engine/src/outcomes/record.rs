//! Outcome records
//!
//! Pure update arithmetic for the per-entity statistics. Persistence and
//! locking live in [`super::store`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Scores kept in a record's history ring
pub const HISTORY_CAPACITY: usize = 10;

/// Distinct issues remembered per subject
pub const SUBJECT_ISSUE_CAPACITY: usize = 5;

/// Distinct "common issues" remembered per organization or platform
pub const AGGREGATE_ISSUE_CAPACITY: usize = 10;

/// Score drop (on a 0..1 scale) at or beyond which a run is flagged
pub const REGRESSION_THRESHOLD: f64 = -0.20;

/// Tolerance for float noise when comparing a delta to the threshold
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Entity kinds with their own statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// What a goal was about
    Subject,
    /// Site that served the answer
    Organization,
    /// Strategy domain the goal ran in
    Platform,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Subject,
        EntityKind::Organization,
        EntityKind::Platform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Subject => "subject",
            EntityKind::Organization => "organization",
            EntityKind::Platform => "platform",
        }
    }

    /// Aggregates keep a running mean and a longer issue list
    pub fn is_aggregate(&self) -> bool {
        !matches!(self, EntityKind::Subject)
    }

    fn issue_capacity(&self) -> usize {
        if self.is_aggregate() {
            AGGREGATE_ISSUE_CAPACITY
        } else {
            SUBJECT_ISSUE_CAPACITY
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "subject" => Ok(EntityKind::Subject),
            "organization" | "organisation" | "org" => Ok(EntityKind::Organization),
            "platform" => Ok(EntityKind::Platform),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}

/// One scored run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub score: f64,
    /// Unix seconds
    pub timestamp: i64,
}

/// Incremental statistics for one entity key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub kind: EntityKind,
    pub key: String,
    pub last_score: Option<f64>,
    pub best_score: Option<f64>,
    pub worst_score: Option<f64>,
    pub mean_score: Option<f64>,
    /// Number of updates applied, scored or not
    pub run_count: u64,
    /// Most recent scores, oldest first
    pub history: VecDeque<ScoreEntry>,
    /// Most recent distinct issues first ("last issues" for subjects,
    /// "common issues" for aggregates)
    pub issues: Vec<String>,
    pub updated_at: i64,
}

impl OutcomeRecord {
    pub fn new(kind: EntityKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            last_score: None,
            best_score: None,
            worst_score: None,
            mean_score: None,
            run_count: 0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            issues: Vec::new(),
            updated_at: 0,
        }
    }

    /// Apply one run.
    ///
    /// `run_count` always increments. Score fields only move when a finite
    /// score is given; it is clamped into `[0, 1]` first.
    pub fn apply(&mut self, score: Option<f64>, issues: &[String], timestamp: i64) {
        self.run_count += 1;
        self.updated_at = timestamp;

        if let Some(score) = score.filter(|s| s.is_finite()).map(|s| s.clamp(0.0, 1.0)) {
            self.last_score = Some(score);
            self.best_score = Some(self.best_score.map_or(score, |best| best.max(score)));
            self.worst_score = Some(self.worst_score.map_or(score, |worst| worst.min(score)));
            self.mean_score = Some(match self.mean_score {
                Some(mean) => mean + (score - mean) / self.run_count as f64,
                None => score,
            });

            self.history.push_back(ScoreEntry { score, timestamp });
            while self.history.len() > HISTORY_CAPACITY {
                self.history.pop_front();
            }
        }

        self.merge_issues(issues);
    }

    /// Newest issues go to the front in their given order; repeats move up.
    fn merge_issues(&mut self, issues: &[String]) {
        let mut fresh: Vec<String> = Vec::new();
        for issue in issues.iter().map(|i| i.trim()).filter(|i| !i.is_empty()) {
            if !fresh.iter().any(|f| f == issue) {
                fresh.push(issue.to_string());
            }
        }
        if fresh.is_empty() {
            return;
        }

        self.issues.retain(|existing| !fresh.contains(existing));
        fresh.append(&mut self.issues);
        fresh.truncate(self.kind.issue_capacity());
        self.issues = fresh;
    }
}

/// Sharp score drop versus the immediately preceding run.
///
/// Reported with the current run only, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionFlag {
    pub previous_score: f64,
    pub current_score: f64,
    pub delta: f64,
}

impl RegressionFlag {
    /// Flag when `current - previous <= threshold`. Needs both scores.
    pub fn detect(previous: Option<f64>, current: Option<f64>, threshold: f64) -> Option<Self> {
        let (previous, current) = (previous?, current?);
        let delta = current - previous;
        (delta <= threshold + THRESHOLD_EPSILON).then_some(Self {
            previous_score: previous,
            current_score: current,
            delta,
        })
    }
}
