use async_trait::async_trait;
use sqlx::{Executor, PgPool};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use thiserror::Error;

use crate::model::StatusChangeEvent;

const SCHEMA: &str = include_str!("../migrations/0001_payment_status.sql");

/// Must agree with `TransactionStatus::is_final`.
const FINAL_STATUSES: [&str; 4] = ["APPROVED", "DECLINED", "VOIDED", "ERROR"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First delivery of this (transaction, status) pair.
    Applied,
    /// Already recorded; nothing changed.
    Duplicate,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("status store lock poisoned")]
    Poisoned,
}

/// Destination for accepted status-change events. Implementations must make a
/// repeated (transaction_id, status) pair a no-op.
#[async_trait]
pub trait StatusEventSink: Send + Sync {
    async fn record(&self, event: &StatusChangeEvent) -> Result<RecordOutcome, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    /// (transaction_id, status) pairs already applied.
    seen: HashSet<(String, String)>,
    latest: HashMap<String, StatusChangeEvent>,
}

/// Process-local sink used when no database is configured, and in tests.
/// Keeps only the dedupe keys and the latest status per reference.
#[derive(Default)]
pub struct InMemoryStatusStore {
    inner: Mutex<MemoryState>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct (transaction, status) pairs applied so far.
    pub fn applied_count(&self) -> usize {
        self.inner.lock().map(|state| state.seen.len()).unwrap_or_default()
    }

    pub fn latest(&self, reference: &str) -> Option<StatusChangeEvent> {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.latest.get(reference).cloned())
    }
}

/// A final status is never replaced by a non-final one, whatever the arrival order.
fn supersedes(current: &StatusChangeEvent, incoming: &StatusChangeEvent) -> bool {
    incoming.status.is_final() || !current.status.is_final()
}

#[async_trait]
impl StatusEventSink for InMemoryStatusStore {
    async fn record(&self, event: &StatusChangeEvent) -> Result<RecordOutcome, StoreError> {
        let mut state = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let key = (event.transaction_id.clone(), event.status.as_str().to_string());
        if !state.seen.insert(key) {
            return Ok(RecordOutcome::Duplicate);
        }
        let replace = state
            .latest
            .get(&event.reference)
            .map_or(true, |current| supersedes(current, event));
        if replace {
            state.latest.insert(event.reference.clone(), event.clone());
        }
        Ok(RecordOutcome::Applied)
    }
}

/// Postgres sink. The event log's primary key is what makes redelivery idempotent.
#[derive(Clone)]
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.pool.execute(SCHEMA).await?;
        Ok(())
    }
}

#[async_trait]
impl StatusEventSink for PgStatusStore {
    async fn record(&self, event: &StatusChangeEvent) -> Result<RecordOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query_scalar::<_, i32>(
            r#"INSERT INTO payment_status_events (transaction_id, status, reference, received_at)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (transaction_id, status) DO NOTHING
               RETURNING 1"#,
        )
        .bind(&event.transaction_id)
        .bind(event.status.as_str())
        .bind(&event.reference)
        .bind(event.received_at)
        .fetch_optional(&mut *tx)
        .await?;
        if inserted.is_none() {
            tx.rollback().await?;
            return Ok(RecordOutcome::Duplicate);
        }
        sqlx::query(
            r#"INSERT INTO payment_status (reference, transaction_id, status, updated_at)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (reference) DO UPDATE
               SET transaction_id = EXCLUDED.transaction_id,
                   status = EXCLUDED.status,
                   updated_at = EXCLUDED.updated_at
               WHERE EXCLUDED.status = ANY($5) OR payment_status.status <> ALL($5)"#,
        )
        .bind(&event.reference)
        .bind(&event.transaction_id)
        .bind(event.status.as_str())
        .bind(event.received_at)
        .bind(FINAL_STATUSES.as_slice())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(RecordOutcome::Applied)
    }
}
