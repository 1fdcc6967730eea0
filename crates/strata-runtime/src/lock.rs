//! Cross-invocation mutual exclusion for batch operations.
//!
//! Two processes running apply-all concurrently would compute overlapping
//! pending sets and race to apply the same script twice. The lock serializes
//! whole batches using the store itself: one row per change-set in a shared
//! lock table, inserted before the batch and deleted after.

use serde_json::Value;
use tracing::debug;

use strata_core::error::{Result, StrataError};
use strata_core::executor::{Executor, Filter, Row};
use strata_core::schema::{ColumnDef, SqlType, TableDef};

/// Shared table holding one row per change-set currently running a batch.
pub const LOCK_TABLE: &str = "strata_locks";

/// Lock-row mutex around a whole batch operation.
///
/// `acquire` inserts a row keyed by the change-set's ledger table; the
/// primary-key violation a second runner hits is the contention signal.
/// A crashed process leaves its row behind, so operators get
/// [`force_release`](BatchLock::force_release).
pub struct BatchLock {
    name: String,
}

impl BatchLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn table_def() -> TableDef {
        TableDef::new(LOCK_TABLE)
            .column(ColumnDef::new("name", SqlType::Varchar(Some(255))).primary_key())
            .column(
                ColumnDef::new("locked_at", SqlType::Timestamptz)
                    .not_null()
                    .default_sql("now()"),
            )
    }

    pub async fn acquire(&self, exec: &dyn Executor) -> Result<()> {
        exec.create_table(&Self::table_def()).await?;

        // locked_at takes its column default.
        let mut row = Row::new();
        row.insert("name".into(), Value::String(self.name.clone()));

        exec.bulk_insert(LOCK_TABLE, &[row]).await.map_err(|e| {
            StrataError::LockHeld(format!(
                "'{}' is locked by another runner (stale after a crash? use unlock): {}",
                self.name, e
            ))
        })?;
        debug!(lock = %self.name, "batch lock acquired");
        Ok(())
    }

    pub async fn release(&self, exec: &dyn Executor) -> Result<()> {
        let mut filter = Filter::new();
        filter.insert("name".into(), Value::String(self.name.clone()));
        exec.bulk_delete(LOCK_TABLE, &filter).await?;
        debug!(lock = %self.name, "batch lock released");
        Ok(())
    }

    /// Remove a stale lock row left behind by a crashed runner. Returns
    /// whether a row was actually removed.
    pub async fn force_release(&self, exec: &dyn Executor) -> Result<bool> {
        exec.create_table(&Self::table_def()).await?;
        let mut filter = Filter::new();
        filter.insert("name".into(), Value::String(self.name.clone()));
        let removed = exec.bulk_delete(LOCK_TABLE, &filter).await?;
        Ok(removed > 0)
    }
}
