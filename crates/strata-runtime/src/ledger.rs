//! Durable record of which change scripts have committed.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use strata_core::error::{Result, StrataError};
use strata_core::executor::{Executor, Row};
use strata_core::schema::{ColumnDef, SqlType, TableDef};

/// A row of the ledger: a script name and when its apply committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub name: String,
    pub executed_at: DateTime<Utc>,
}

/// The ledger table for one change-set.
///
/// An entry exists for a name iff that script's apply has committed and no
/// later revert has. Entries are written and removed inside the same
/// transaction as the script operation itself; the ledger never opens its
/// own transactions.
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn table_def(&self) -> TableDef {
        TableDef::new(&self.table)
            .column(ColumnDef::new("name", SqlType::Varchar(Some(255))).primary_key())
            .column(
                ColumnDef::new("executed_at", SqlType::Timestamptz)
                    .not_null()
                    .default_sql("now()"),
            )
    }

    /// Create the ledger table if absent. Idempotent, safe on every
    /// runner operation.
    pub async fn ensure_initialized(&self, exec: &dyn Executor) -> Result<()> {
        exec.create_table(&self.table_def()).await.map_err(|e| {
            StrataError::LedgerInit(format!("failed to create '{}': {}", self.table, e))
        })?;
        debug!(table = %self.table, "ledger initialized");
        Ok(())
    }

    /// All entries, sorted ascending by name.
    pub async fn list_applied(&self, exec: &dyn Executor) -> Result<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT name, executed_at FROM {} ORDER BY name",
            self.table
        );
        let rows = exec.query(&sql, &[]).await.map_err(|e| {
            StrataError::LedgerInit(format!("failed to read '{}': {}", self.table, e))
        })?;

        rows.into_iter().map(parse_entry).collect()
    }

    /// Record that `name` has been applied. The caller must hold the
    /// transaction wrapping the script's own apply.
    pub async fn record_applied(&self, exec: &dyn Executor, name: &str) -> Result<()> {
        let sql = format!("INSERT INTO {} (name) VALUES ($1)", self.table);
        exec.execute(&sql, &[Value::String(name.to_string())])
            .await?;
        Ok(())
    }

    /// Remove the record for `name`. Same transaction rule as
    /// [`record_applied`](Ledger::record_applied).
    pub async fn record_reverted(&self, exec: &dyn Executor, name: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE name = $1", self.table);
        exec.execute(&sql, &[Value::String(name.to_string())])
            .await?;
        Ok(())
    }

    /// Drop the ledger table entirely. Only reset does this.
    pub async fn drop_table(&self, exec: &dyn Executor) -> Result<()> {
        exec.drop_table(&self.table).await
    }
}

fn parse_entry(row: Row) -> Result<LedgerEntry> {
    let name = row
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StrataError::Storage("ledger row missing 'name'".into()))?
        .to_string();

    let executed_at = row
        .get("executed_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            StrataError::Storage(format!("ledger row '{}' has an unreadable executed_at", name))
        })?;

    Ok(LedgerEntry { name, executed_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailPoint, MemoryExecutor};

    #[tokio::test]
    async fn test_ensure_initialized_is_idempotent() {
        let exec = MemoryExecutor::new();
        let ledger = Ledger::new("strata_migrations");

        ledger.ensure_initialized(&exec).await.unwrap();
        ledger.record_applied(&exec, "001_a").await.unwrap();
        ledger.ensure_initialized(&exec).await.unwrap();

        assert_eq!(ledger.list_applied(&exec).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_and_list_sorted() {
        let exec = MemoryExecutor::new();
        let ledger = Ledger::new("strata_migrations");
        ledger.ensure_initialized(&exec).await.unwrap();

        ledger.record_applied(&exec, "002_b").await.unwrap();
        ledger.record_applied(&exec, "001_a").await.unwrap();

        let entries = ledger.list_applied(&exec).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["001_a", "002_b"]);
    }

    #[tokio::test]
    async fn test_record_reverted_removes_entry() {
        let exec = MemoryExecutor::new();
        let ledger = Ledger::new("strata_migrations");
        ledger.ensure_initialized(&exec).await.unwrap();

        ledger.record_applied(&exec, "001_a").await.unwrap();
        ledger.record_reverted(&exec, "001_a").await.unwrap();

        assert!(ledger.list_applied(&exec).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_record_fails() {
        // At-most-once: the primary key refuses a second apply record.
        let exec = MemoryExecutor::new();
        let ledger = Ledger::new("strata_migrations");
        ledger.ensure_initialized(&exec).await.unwrap();

        ledger.record_applied(&exec, "001_a").await.unwrap();
        assert!(ledger.record_applied(&exec, "001_a").await.is_err());
    }

    #[tokio::test]
    async fn test_init_failure_maps_to_ledger_init() {
        let exec = MemoryExecutor::new();
        exec.inject_failure(FailPoint::CreateTable);
        let ledger = Ledger::new("strata_migrations");

        let err = ledger.ensure_initialized(&exec).await.unwrap_err();
        assert!(matches!(err, StrataError::LedgerInit(_)));
    }
}
