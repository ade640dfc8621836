//! Outcome Memory Store
//!
//! Durable per-entity statistics. Every update is a read-modify-write of one
//! row done under that key's lock, so concurrent callers never lose a run.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::record::{EntityKind, OutcomeRecord};
use crate::db::OutcomeRepository;

/// Result of one update: the score before it was applied, and the new record
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeUpdate {
    pub previous_score: Option<f64>,
    pub record: OutcomeRecord,
}

type KeyLocks = HashMap<(EntityKind, String), Arc<Mutex<()>>>;

/// Keyed statistics store backed by SQLite
pub struct OutcomeMemoryStore {
    repository: OutcomeRepository,
    locks: Mutex<KeyLocks>,
}

impl OutcomeMemoryStore {
    pub fn new(repository: OutcomeRepository) -> Self {
        Self {
            repository,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Keys are trimmed and lowercased so "Ada Lovelace" and "ada lovelace"
    /// share one record.
    pub fn normalize_key(key: &str) -> String {
        key.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    async fn key_lock(&self, kind: EntityKind, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry((kind, key.to_string())).or_default())
    }

    /// Apply one run to the record for `(kind, key)`, creating it if needed.
    pub async fn update_outcome(
        &self,
        kind: EntityKind,
        key: &str,
        score: Option<f64>,
        issues: &[String],
        timestamp: i64,
    ) -> Result<OutcomeUpdate> {
        let key = Self::normalize_key(key);
        if key.is_empty() {
            bail!("Outcome key for {} must not be empty", kind);
        }

        let lock = self.key_lock(kind, &key).await;
        let update = {
            let _guard = lock.lock().await;
            self.apply_locked(kind, &key, score, issues, timestamp).await
        };
        self.release_key_lock(kind, &key, lock).await;
        update
    }

    async fn apply_locked(
        &self,
        kind: EntityKind,
        key: &str,
        score: Option<f64>,
        issues: &[String],
        timestamp: i64,
    ) -> Result<OutcomeUpdate> {
        let mut record = self
            .repository
            .get(kind, key)
            .await?
            .unwrap_or_else(|| OutcomeRecord::new(kind, key));
        let previous_score = record.last_score;

        record.apply(score, issues, timestamp);
        self.repository.upsert(&record).await?;

        debug!(
            "Outcome {}:{} updated, runs={} last={:?}",
            kind, key, record.run_count, record.last_score
        );

        Ok(OutcomeUpdate {
            previous_score,
            record,
        })
    }

    /// Hand back a key's lock and forget it once no other caller holds it.
    /// Handles are only cloned and dropped under the map lock, so the count
    /// read here is exact.
    async fn release_key_lock(&self, kind: EntityKind, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        let map_key = (kind, key.to_string());
        if locks
            .get(&map_key)
            .map_or(false, |entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&map_key);
        }
    }

    /// Keys currently holding a lock entry
    pub async fn tracked_keys(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn get(&self, kind: EntityKind, key: &str) -> Result<Option<OutcomeRecord>> {
        self.repository.get(kind, &Self::normalize_key(key)).await
    }

    /// Reporting view: every record of one kind
    pub async fn list(&self, kind: EntityKind) -> Result<Vec<OutcomeRecord>> {
        self.repository.list(kind).await
    }
}
