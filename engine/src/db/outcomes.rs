/// Outcome record persistence
///
/// One row per `(kind, entity_key)`. The record itself is stored as JSON so
/// the statistics can grow fields without schema changes. All queries are
/// parameterized.
use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use crate::outcomes::{EntityKind, OutcomeRecord};

/// Repository for the `outcome_records` table
#[derive(Clone)]
pub struct OutcomeRepository {
    pool: SqlitePool,
}

impl OutcomeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch one record
    pub async fn get(&self, kind: EntityKind, key: &str) -> Result<Option<OutcomeRecord>> {
        let row = sqlx::query("SELECT record FROM outcome_records WHERE kind = ? AND entity_key = ?")
            .bind(kind.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch outcome record")?;

        row.map(|r| decode(&r.get::<String, _>("record")))
            .transpose()
    }

    /// Insert or replace a record
    pub async fn upsert(&self, record: &OutcomeRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize outcome record")?;

        sqlx::query(
            "INSERT INTO outcome_records (kind, entity_key, record, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(kind, entity_key) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at",
        )
        .bind(record.kind.as_str())
        .bind(&record.key)
        .bind(json)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to store outcome record")?;

        Ok(())
    }

    /// All records of one kind, ordered by key
    pub async fn list(&self, kind: EntityKind) -> Result<Vec<OutcomeRecord>> {
        let rows = sqlx::query(
            "SELECT record FROM outcome_records WHERE kind = ? ORDER BY entity_key ASC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list outcome records")?;

        rows.iter()
            .map(|r| decode(&r.get::<String, _>("record")))
            .collect()
    }

    /// Number of stored records of one kind
    pub async fn count(&self, kind: EntityKind) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outcome_records WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count outcome records")?;

        Ok(count)
    }
}

fn decode(json: &str) -> Result<OutcomeRecord> {
    serde_json::from_str(json).context("Stored outcome record is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        (temp_dir, db)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (_dir, db) = setup().await;
        let repo = db.outcomes();

        let mut record = OutcomeRecord::new(EntityKind::Subject, "ada lovelace");
        record.apply(Some(0.8), &["slow".to_string()], 10);
        repo.upsert(&record).await.unwrap();

        let loaded = repo.get(EntityKind::Subject, "ada lovelace").await.unwrap();
        assert_eq!(loaded, Some(record.clone()));

        record.apply(Some(0.6), &[], 20);
        repo.upsert(&record).await.unwrap();
        assert_eq!(repo.count(EntityKind::Subject).await.unwrap(), 1);
        assert_eq!(
            repo.get(EntityKind::Subject, "ada lovelace")
                .await
                .unwrap()
                .unwrap()
                .run_count,
            2
        );
    }

    #[tokio::test]
    async fn test_kinds_are_separate_namespaces() {
        let (_dir, db) = setup().await;
        let repo = db.outcomes();

        repo.upsert(&OutcomeRecord::new(EntityKind::Organization, "wikipedia.org"))
            .await
            .unwrap();

        assert!(repo
            .get(EntityKind::Platform, "wikipedia.org")
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.list(EntityKind::Organization).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_orders_by_key() {
        let (_dir, db) = setup().await;
        let repo = db.outcomes();

        for key in ["zeta", "alpha", "mid"] {
            repo.upsert(&OutcomeRecord::new(EntityKind::Subject, key))
                .await
                .unwrap();
        }

        let keys: Vec<String> = repo
            .list(EntityKind::Subject)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }
}
