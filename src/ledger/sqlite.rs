//! SQLite-backed ledger and promotion store.
//!
//! The persistent backend for single-server deployments: reservations
//! and promotion state survive process restarts, which is what makes
//! crash/re-run safety work end to end.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{PipelineError, PromotionError, PromotionResult, Result};
use crate::traits::ledger::{DedupLedger, DedupLedgerEntry, PromotionStore, ReserveOutcome};
use crate::types::{PromotionRecord, PromotionStatus, Tier};

/// SQLite-backed dedup ledger and promotion store over one pool.
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (or create) a ledger at the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - ephemeral, for tests
    /// - `sqlite://./ledger.db?mode=rwc` - create if not exists
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    /// Create an in-memory ledger (for testing).
    ///
    /// Pinned to one long-lived connection; pooled `:memory:`
    /// connections would each see a separate empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger (
                bucket TEXT NOT NULL,
                canonical_key TEXT NOT NULL,
                content_hash TEXT,
                reserved_at TEXT NOT NULL,
                processed_at TEXT,
                PRIMARY KEY (bucket, canonical_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_ledger_processed_at ON ledger(processed_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS promotions (
                canonical_key TEXT NOT NULL,
                bucket TEXT NOT NULL,
                tier TEXT NOT NULL,
                status TEXT NOT NULL,
                reason TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_attempt_at TEXT,
                PRIMARY KEY (canonical_key, tier)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    canonical_key: String,
    bucket: String,
    content_hash: Option<String>,
    reserved_at: String,
    processed_at: Option<String>,
}

impl LedgerRow {
    fn into_entry(self) -> Result<DedupLedgerEntry> {
        Ok(DedupLedgerEntry {
            canonical_key: self.canonical_key,
            bucket: self.bucket,
            content_hash: self.content_hash,
            reserved_at: parse_ts(&self.reserved_at)?,
            processed_at: self.processed_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::Ledger(format!("invalid timestamp: {e}").into()))
}

#[async_trait]
impl DedupLedger for SqliteLedger {
    async fn check_and_reserve(
        &self,
        bucket: &str,
        canonical_key: &str,
        staleness: chrono::Duration,
    ) -> Result<ReserveOutcome> {
        let now = Utc::now();
        let stale_cutoff = (now - staleness).to_rfc3339();

        // Single upsert: a fresh insert or a stale-reservation reclaim
        // affects one row; a live entry affects none. SQLite serializes
        // writers, which gives the at-most-one-Reserved guarantee.
        let result = sqlx::query(
            r#"
            INSERT INTO ledger (bucket, canonical_key, content_hash, reserved_at, processed_at)
            VALUES (?, ?, NULL, ?, NULL)
            ON CONFLICT(bucket, canonical_key) DO UPDATE SET
                reserved_at = excluded.reserved_at,
                content_hash = NULL
            WHERE ledger.processed_at IS NULL AND ledger.reserved_at < ?
            "#,
        )
        .bind(bucket)
        .bind(canonical_key)
        .bind(now.to_rfc3339())
        .bind(&stale_cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        if result.rows_affected() == 1 {
            Ok(ReserveOutcome::Reserved)
        } else {
            Ok(ReserveOutcome::Duplicate)
        }
    }

    async fn confirm(&self, bucket: &str, canonical_key: &str, content_hash: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE ledger SET content_hash = ?, processed_at = ? WHERE bucket = ? AND canonical_key = ?",
        )
        .bind(content_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(bucket)
        .bind(canonical_key)
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::Ledger(
                format!("confirm without reservation: {bucket}/{canonical_key}").into(),
            ));
        }
        Ok(())
    }

    async fn release(&self, bucket: &str, canonical_key: &str) -> Result<()> {
        sqlx::query(
            "DELETE FROM ledger WHERE bucket = ? AND canonical_key = ? AND processed_at IS NULL",
        )
        .bind(bucket)
        .bind(canonical_key)
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;
        Ok(())
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<DedupLedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            "SELECT canonical_key, bucket, content_hash, reserved_at, processed_at FROM ledger WHERE bucket = ?",
        )
        .bind(bucket)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        rows.into_iter().map(LedgerRow::into_entry).collect()
    }

    async fn prune(&self, bucket: &str, older_than: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query(
            "DELETE FROM ledger WHERE bucket = ? AND processed_at IS NOT NULL AND processed_at < ?",
        )
        .bind(bucket)
        .bind(older_than.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::Ledger(e.to_string().into()))?;

        Ok(result.rows_affected() as usize)
    }
}

#[derive(Debug, FromRow)]
struct PromotionRow {
    canonical_key: String,
    bucket: String,
    tier: String,
    status: String,
    reason: Option<String>,
    attempts: i64,
    last_attempt_at: Option<String>,
}

impl PromotionRow {
    fn into_record(self) -> PromotionResult<PromotionRecord> {
        let tier: Tier = self.tier.parse().map_err(PromotionError::Store)?;
        let reason = self.reason.unwrap_or_default();
        let status = match self.status.as_str() {
            "pending" => PromotionStatus::Pending,
            "succeeded" => PromotionStatus::Succeeded,
            "failed" => PromotionStatus::Failed { reason },
            "abandoned" => PromotionStatus::Abandoned { reason },
            other => {
                return Err(PromotionError::Store(format!("unknown status: {other}")));
            }
        };
        let last_attempt_at = self
            .last_attempt_at
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| PromotionError::Store(format!("invalid timestamp: {e}")))
            })
            .transpose()?;

        Ok(PromotionRecord {
            canonical_key: self.canonical_key,
            bucket: self.bucket,
            tier,
            status,
            attempts: self.attempts as u32,
            last_attempt_at,
        })
    }
}

fn status_columns(status: &PromotionStatus) -> (&'static str, Option<&str>) {
    match status {
        PromotionStatus::Pending => ("pending", None),
        PromotionStatus::Succeeded => ("succeeded", None),
        PromotionStatus::Failed { reason } => ("failed", Some(reason)),
        PromotionStatus::Abandoned { reason } => ("abandoned", Some(reason)),
    }
}

#[async_trait]
impl PromotionStore for SqliteLedger {
    async fn get(
        &self,
        canonical_key: &str,
        tier: Tier,
    ) -> PromotionResult<Option<PromotionRecord>> {
        let row = sqlx::query_as::<_, PromotionRow>(
            "SELECT canonical_key, bucket, tier, status, reason, attempts, last_attempt_at FROM promotions WHERE canonical_key = ? AND tier = ?",
        )
        .bind(canonical_key)
        .bind(tier.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PromotionError::Store(e.to_string()))?;

        row.map(PromotionRow::into_record).transpose()
    }

    async fn upsert(&self, record: &PromotionRecord) -> PromotionResult<()> {
        let (status, reason) = status_columns(&record.status);

        sqlx::query(
            r#"
            INSERT INTO promotions (canonical_key, bucket, tier, status, reason, attempts, last_attempt_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(canonical_key, tier) DO UPDATE SET
                bucket = excluded.bucket,
                status = excluded.status,
                reason = excluded.reason,
                attempts = excluded.attempts,
                last_attempt_at = excluded.last_attempt_at
            "#,
        )
        .bind(&record.canonical_key)
        .bind(&record.bucket)
        .bind(record.tier.as_str())
        .bind(status)
        .bind(reason)
        .bind(record.attempts as i64)
        .bind(record.last_attempt_at.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| PromotionError::Store(e.to_string()))?;

        Ok(())
    }

    async fn records_for(&self, canonical_key: &str) -> PromotionResult<Vec<PromotionRecord>> {
        let rows = sqlx::query_as::<_, PromotionRow>(
            "SELECT canonical_key, bucket, tier, status, reason, attempts, last_attempt_at FROM promotions WHERE canonical_key = ?",
        )
        .bind(canonical_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PromotionError::Store(e.to_string()))?;

        let mut records: Vec<PromotionRecord> = rows
            .into_iter()
            .map(PromotionRow::into_record)
            .collect::<PromotionResult<_>>()?;
        records.sort_by_key(|r| Tier::ALL.iter().position(|t| *t == r.tier));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_confirm_roundtrip() {
        let ledger = SqliteLedger::in_memory().await.unwrap();
        let window = chrono::Duration::hours(1);

        assert_eq!(
            ledger
                .check_and_reserve("daily", "src:1", window)
                .await
                .unwrap(),
            ReserveOutcome::Reserved
        );
        assert_eq!(
            ledger
                .check_and_reserve("daily", "src:1", window)
                .await
                .unwrap(),
            ReserveOutcome::Duplicate
        );

        ledger.confirm("daily", "src:1", "hash").await.unwrap();
        let entries = ledger.entries("daily").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_confirmed());
        assert_eq!(entries[0].content_hash.as_deref(), Some("hash"));
    }

    #[tokio::test]
    async fn test_stale_reclaim_after_restart() {
        let ledger = SqliteLedger::in_memory().await.unwrap();

        ledger
            .check_and_reserve("daily", "src:1", chrono::Duration::hours(1))
            .await
            .unwrap();

        // Simulated crashed run: reservation never confirmed. With a
        // zero window the next pass reclaims it.
        let outcome = ledger
            .check_and_reserve("daily", "src:1", chrono::Duration::zero())
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Reserved);
    }

    #[tokio::test]
    async fn test_confirmed_not_reclaimed() {
        let ledger = SqliteLedger::in_memory().await.unwrap();

        ledger
            .check_and_reserve("daily", "src:1", chrono::Duration::hours(1))
            .await
            .unwrap();
        ledger.confirm("daily", "src:1", "hash").await.unwrap();

        let outcome = ledger
            .check_and_reserve("daily", "src:1", chrono::Duration::zero())
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_release_and_prune() {
        let ledger = SqliteLedger::in_memory().await.unwrap();
        let window = chrono::Duration::hours(1);

        ledger
            .check_and_reserve("daily", "keep", window)
            .await
            .unwrap();
        ledger.confirm("daily", "keep", "h").await.unwrap();
        ledger
            .check_and_reserve("daily", "drop", window)
            .await
            .unwrap();
        ledger.release("daily", "drop").await.unwrap();

        assert_eq!(ledger.entries("daily").await.unwrap().len(), 1);

        let pruned = ledger
            .prune("daily", Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert!(ledger.entries("daily").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_promotion_records() {
        let ledger = SqliteLedger::in_memory().await.unwrap();

        let mut record = PromotionRecord::pending("src:1", "daily", Tier::Blob);
        record.attempts = 2;
        record.status = PromotionStatus::Failed {
            reason: "503".into(),
        };
        record.last_attempt_at = Some(Utc::now());
        ledger.upsert(&record).await.unwrap();

        let loaded = ledger.get("src:1", Tier::Blob).await.unwrap().unwrap();
        assert_eq!(loaded.attempts, 2);
        assert_eq!(
            loaded.status,
            PromotionStatus::Failed {
                reason: "503".into()
            }
        );

        record.status = PromotionStatus::Succeeded;
        ledger.upsert(&record).await.unwrap();
        let loaded = ledger.get("src:1", Tier::Blob).await.unwrap().unwrap();
        assert_eq!(loaded.status, PromotionStatus::Succeeded);
    }
}
