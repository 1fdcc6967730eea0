//! In-memory fake [`Executor`] for contract tests.
//!
//! Stores tables as JSON rows behind a mutex, enforces primary-key
//! uniqueness, and implements transactions by snapshotting the whole state
//! on `begin`. Raw SQL support is limited to the statement shapes the ledger
//! issues (single-table SELECT / single-row INSERT / keyed DELETE).

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;

use strata_core::error::{Result, StrataError};
use strata_core::executor::{BoxFuture, Executor, Filter, Row};
use strata_core::schema::{ColumnDef, IndexDef, TableDef};

/// A failure point that can be armed on the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// The next `commit` fails.
    Commit,
    /// The next `create_table` fails.
    CreateTable,
}

#[derive(Debug, Clone, Default)]
struct MemTable {
    columns: Vec<ColumnDef>,
    rows: Vec<Row>,
}

impl MemTable {
    fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    fn next_id(&self, pk: &str) -> i64 {
        self.rows
            .iter()
            .filter_map(|r| r.get(pk).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    tables: BTreeMap<String, MemTable>,
    indexes: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    committed: State,
    /// Working copy while a transaction is open.
    tx: Option<State>,
    fail_next: Option<FailPoint>,
}

impl Inner {
    fn effective(&mut self) -> &mut State {
        self.tx.as_mut().unwrap_or(&mut self.committed)
    }
}

/// In-memory implementation of the full [`Executor`] surface.
#[derive(Default)]
pub struct MemoryExecutor {
    inner: Mutex<Inner>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure.
    pub fn inject_failure(&self, point: FailPoint) {
        self.inner.lock().unwrap().fail_next = Some(point);
    }

    /// Whether the committed state contains `table`.
    pub fn has_table(&self, table: &str) -> bool {
        self.inner.lock().unwrap().committed.tables.contains_key(table)
    }

    /// Committed rows of `table` (empty if the table does not exist).
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .lock()
            .unwrap()
            .committed
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Names of indexes created so far (committed state).
    pub fn indexes(&self) -> Vec<String> {
        self.inner.lock().unwrap().committed.indexes.clone()
    }

    fn take_fail(&self, point: FailPoint) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next == Some(point) {
            inner.fail_next = None;
            true
        } else {
            false
        }
    }

    fn create_table_sync(&self, table: &TableDef) -> Result<()> {
        if self.take_fail(FailPoint::CreateTable) {
            return Err(StrataError::Storage("injected create_table failure".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        let state = inner.effective();
        state.tables.entry(table.name.clone()).or_insert_with(|| MemTable {
            columns: table.columns.clone(),
            rows: Vec::new(),
        });
        Ok(())
    }

    fn drop_table_sync(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.effective().tables.remove(name);
        Ok(())
    }

    fn add_index_sync(&self, index: &IndexDef) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.effective();
        if !state.tables.contains_key(&index.table) {
            return Err(StrataError::Storage(format!(
                "no such table '{}'",
                index.table
            )));
        }
        state.indexes.push(index.name());
        Ok(())
    }

    fn insert_rows_sync(&self, table: &str, rows: &[Row]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.effective();
        let mem = state
            .tables
            .get_mut(table)
            .ok_or_else(|| StrataError::Storage(format!("no such table '{}'", table)))?;

        for row in rows {
            let mut row = row.clone();
            fill_defaults(&mem.columns, &mut row);

            if let Some(pk) = mem.primary_key() {
                let name = pk.name.clone();
                if pk.auto_increment && !row.contains_key(&name) {
                    row.insert(name.clone(), Value::Number(mem.next_id(&name).into()));
                }
                let key = row.get(&name).cloned().unwrap_or(Value::Null);
                if key == Value::Null {
                    return Err(StrataError::Storage(format!(
                        "null primary key for '{}'",
                        table
                    )));
                }
                if mem.rows.iter().any(|r| r.get(&name) == Some(&key)) {
                    return Err(StrataError::Storage(format!(
                        "duplicate key {} in '{}'",
                        key, table
                    )));
                }
            }

            mem.rows.push(row);
        }
        Ok(())
    }

    fn delete_rows_sync(&self, table: &str, filter: &Filter) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.effective();
        let mem = state
            .tables
            .get_mut(table)
            .ok_or_else(|| StrataError::Storage(format!("no such table '{}'", table)))?;

        let before = mem.rows.len();
        mem.rows.retain(|row| !matches_filter(row, filter));
        Ok((before - mem.rows.len()) as u64)
    }

    fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let shape = parse_select(sql)
            .ok_or_else(|| StrataError::Storage(format!("unsupported query: {}", sql)))?;

        let mut inner = self.inner.lock().unwrap();
        let state = inner.effective();
        let mem = state
            .tables
            .get(&shape.table)
            .ok_or_else(|| StrataError::Storage(format!("no such table '{}'", shape.table)))?;

        let mut rows: Vec<Row> = mem
            .rows
            .iter()
            .filter(|row| match (&shape.where_col, params.first()) {
                (Some(col), Some(value)) => row.get(col) == Some(value),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|row| match &shape.columns {
                Some(cols) => cols
                    .iter()
                    .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                    .collect(),
                None => row.clone(),
            })
            .collect();

        if let Some(order) = &shape.order_by {
            rows.sort_by(|a, b| {
                let av = a.get(order).and_then(Value::as_str).unwrap_or_default();
                let bv = b.get(order).and_then(Value::as_str).unwrap_or_default();
                av.cmp(bv)
            });
        }

        Ok(rows)
    }

    fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64> {
        if let Some((table, columns)) = parse_insert(sql) {
            let mut row = Row::new();
            for (column, value) in columns.iter().zip(params.iter()) {
                row.insert(column.clone(), value.clone());
            }
            self.insert_rows_sync(&table, &[row])?;
            return Ok(1);
        }

        if let Some((table, column)) = parse_delete(sql) {
            let mut filter = Filter::new();
            filter.insert(column, params.first().cloned().unwrap_or(Value::Null));
            return self.delete_rows_sync(&table, &filter);
        }

        Err(StrataError::Storage(format!("unsupported statement: {}", sql)))
    }

    fn begin_sync(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.tx.is_some() {
            return Err(StrataError::Storage("transaction already open".into()));
        }
        inner.tx = Some(inner.committed.clone());
        Ok(())
    }

    fn commit_sync(&self) -> Result<()> {
        if self.take_fail(FailPoint::Commit) {
            // Leave the transaction discarded, as a lost connection would.
            self.inner.lock().unwrap().tx = None;
            return Err(StrataError::Storage("injected commit failure".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        let tx = inner
            .tx
            .take()
            .ok_or_else(|| StrataError::Storage("no open transaction".into()))?;
        inner.committed = tx;
        Ok(())
    }

    fn rollback_sync(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .tx
            .take()
            .ok_or_else(|| StrataError::Storage("no open transaction".into()))?;
        Ok(())
    }
}

impl Executor for MemoryExecutor {
    fn create_table<'a>(&'a self, table: &'a TableDef) -> BoxFuture<'a, ()> {
        Box::pin(async move { self.create_table_sync(table) })
    }

    fn drop_table<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move { self.drop_table_sync(name) })
    }

    fn add_index<'a>(&'a self, index: &'a IndexDef) -> BoxFuture<'a, ()> {
        Box::pin(async move { self.add_index_sync(index) })
    }

    fn bulk_insert<'a>(&'a self, table: &'a str, rows: &'a [Row]) -> BoxFuture<'a, ()> {
        Box::pin(async move { self.insert_rows_sync(table, rows) })
    }

    fn bulk_delete<'a>(&'a self, table: &'a str, filter: &'a Filter) -> BoxFuture<'a, u64> {
        Box::pin(async move { self.delete_rows_sync(table, filter) })
    }

    fn query<'a>(&'a self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, Vec<Row>> {
        Box::pin(async move { self.query_sync(sql, params) })
    }

    fn execute<'a>(&'a self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, u64> {
        Box::pin(async move { self.execute_sync(sql, params) })
    }

    fn begin(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.begin_sync() })
    }

    fn commit(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.commit_sync() })
    }

    fn rollback(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.rollback_sync() })
    }
}

/// Fill missing columns from declared defaults.
fn fill_defaults(columns: &[ColumnDef], row: &mut Row) {
    for column in columns {
        if row.contains_key(&column.name) {
            continue;
        }
        if let Some(default) = &column.default {
            row.insert(column.name.clone(), eval_default(default));
        }
    }
}

/// Interpret the small set of default expressions the change scripts use.
fn eval_default(expr: &str) -> Value {
    let expr = expr.trim();
    if expr.eq_ignore_ascii_case("now()") {
        return Value::String(Utc::now().to_rfc3339());
    }
    if let Some(stripped) = expr.strip_prefix('\'') {
        if let Some(inner) = stripped.split('\'').next() {
            return Value::String(inner.to_string());
        }
    }
    if expr.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if expr.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(n) = expr.parse::<i64>() {
        return Value::Number(n.into());
    }
    Value::String(expr.to_string())
}

fn matches_filter(row: &Row, filter: &Filter) -> bool {
    filter.iter().all(|(column, expected)| {
        let actual = row.get(column).unwrap_or(&Value::Null);
        match expected {
            Value::Array(options) => options.contains(actual),
            Value::Null => actual == &Value::Null,
            other => actual == other,
        }
    })
}

struct SelectShape {
    /// None means `SELECT *`.
    columns: Option<Vec<String>>,
    table: String,
    where_col: Option<String>,
    order_by: Option<String>,
}

fn parse_select(sql: &str) -> Option<SelectShape> {
    let rest = sql.trim().strip_prefix("SELECT ")?;
    let (cols, rest) = rest.split_once(" FROM ")?;
    let columns = if cols.trim() == "*" {
        None
    } else {
        Some(cols.split(',').map(|c| c.trim().to_string()).collect())
    };

    let mut table = rest.trim();
    let mut where_col = None;
    let mut order_by = None;

    if let Some((head, tail)) = table.split_once(" ORDER BY ") {
        order_by = Some(tail.trim().to_string());
        table = head.trim();
    }
    if let Some((head, tail)) = table.split_once(" WHERE ") {
        let (col, _) = tail.split_once('=')?;
        where_col = Some(col.trim().to_string());
        table = head.trim();
    }

    Some(SelectShape {
        columns,
        table: table.to_string(),
        where_col,
        order_by,
    })
}

fn parse_insert(sql: &str) -> Option<(String, Vec<String>)> {
    let rest = sql.trim().strip_prefix("INSERT INTO ")?;
    let (table, rest) = rest.split_once('(')?;
    let (cols, _) = rest.split_once(')')?;
    Some((
        table.trim().to_string(),
        cols.split(',').map(|c| c.trim().to_string()).collect(),
    ))
}

fn parse_delete(sql: &str) -> Option<(String, String)> {
    let rest = sql.trim().strip_prefix("DELETE FROM ")?;
    let (table, rest) = rest.split_once(" WHERE ")?;
    let (col, _) = rest.split_once('=')?;
    Some((table.trim().to_string(), col.trim().to_string()))
}
