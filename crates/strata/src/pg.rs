//! sqlx/Postgres implementation of the executor surface.
//!
//! DDL and DML are rendered from the dialect-agnostic descriptors by pure
//! functions (unit-tested without a database); execution routes through the
//! active transaction when one is open.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgColumn, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, Row as SqlxRow, Transaction, TypeInfo};
use tokio::sync::Mutex;
use tracing::debug;

use strata_core::config::DatabaseConfig;
use strata_core::error::{Result, StrataError};
use strata_core::executor::{BoxFuture, Executor, Filter, Row};
use strata_core::schema::{ColumnDef, IndexDef, SqlType, TableDef};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Postgres-backed [`Executor`].
pub struct PgExecutor {
    pool: PgPool,
    /// The single active transaction, if any.
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgExecutor {
    /// Connect a pool using the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| StrataError::Storage(format!("failed to connect to database: {}", e)))?;

        debug!(pool_size = config.pool_size, "database pool connected");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    async fn run_statement(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let query = bind_params(sqlx::query(sql), params)?;

        let mut guard = self.tx.lock().await;
        let result = match guard.as_mut() {
            Some(tx) => query.execute(&mut **tx).await,
            None => query.execute(&self.pool).await,
        };

        result
            .map(|r| r.rows_affected())
            .map_err(|e| StrataError::Storage(format!("statement failed: {}", e)))
    }

    async fn run_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let query = bind_params(sqlx::query(sql), params)?;

        let mut guard = self.tx.lock().await;
        let rows = match guard.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await,
            None => query.fetch_all(&self.pool).await,
        }
        .map_err(|e| StrataError::Storage(format!("query failed: {}", e)))?;

        rows.iter().map(decode_row).collect()
    }
}

impl Executor for PgExecutor {
    fn create_table<'a>(&'a self, table: &'a TableDef) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.run_statement(&render_create_table(table), &[]).await?;
            Ok(())
        })
    }

    fn drop_table<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.run_statement(&format!("DROP TABLE IF EXISTS {}", name), &[])
                .await?;
            Ok(())
        })
    }

    fn add_index<'a>(&'a self, index: &'a IndexDef) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.run_statement(&render_create_index(index), &[]).await?;
            Ok(())
        })
    }

    fn bulk_insert<'a>(&'a self, table: &'a str, rows: &'a [Row]) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            // One statement per row: rows in a batch may name different
            // column subsets, and absent columns must take their defaults.
            for row in rows {
                let (sql, params) = render_insert(table, row);
                self.run_statement(&sql, &params).await?;
            }
            Ok(())
        })
    }

    fn bulk_delete<'a>(&'a self, table: &'a str, filter: &'a Filter) -> BoxFuture<'a, u64> {
        Box::pin(async move {
            let (sql, params) = render_delete(table, filter);
            self.run_statement(&sql, &params).await
        })
    }

    fn query<'a>(&'a self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, Vec<Row>> {
        Box::pin(async move { self.run_query(sql, params).await })
    }

    fn execute<'a>(&'a self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, u64> {
        Box::pin(async move { self.run_statement(sql, params).await })
    }

    fn begin(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut guard = self.tx.lock().await;
            if guard.is_some() {
                return Err(StrataError::Storage("transaction already open".into()));
            }
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| StrataError::Storage(format!("begin failed: {}", e)))?;
            *guard = Some(tx);
            Ok(())
        })
    }

    fn commit(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let tx = self
                .tx
                .lock()
                .await
                .take()
                .ok_or_else(|| StrataError::Storage("no open transaction".into()))?;
            tx.commit()
                .await
                .map_err(|e| StrataError::Storage(format!("commit failed: {}", e)))
        })
    }

    fn rollback(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let tx = self
                .tx
                .lock()
                .await
                .take()
                .ok_or_else(|| StrataError::Storage("no open transaction".into()))?;
            tx.rollback()
                .await
                .map_err(|e| StrataError::Storage(format!("rollback failed: {}", e)))
        })
    }
}

fn bind_params<'q>(mut query: PgQuery<'q>, params: &'q [Value]) -> Result<PgQuery<'q>> {
    for value in params {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(f) = n.as_f64() {
                    query.bind(f)
                } else {
                    return Err(StrataError::Storage(format!("unbindable number: {}", n)));
                }
            }
            Value::String(s) => query.bind(s.as_str()),
            other => query.bind(sqlx::types::Json(other.clone())),
        };
    }
    Ok(query)
}

fn render_create_table(table: &TableDef) -> String {
    let columns: Vec<String> = table.columns.iter().map(render_column).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table.name,
        columns.join(",\n    ")
    )
}

fn render_column(column: &ColumnDef) -> String {
    let mut sql = format!("{} {}", column.name, render_type(column));

    if column.primary_key {
        sql.push_str(" PRIMARY KEY");
    } else if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    if !column.auto_increment {
        if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
    }
    if let SqlType::Enum(values) = &column.sql_type {
        let list: Vec<String> = values.iter().map(|v| format!("'{}'", v)).collect();
        sql.push_str(&format!(" CHECK ({} IN ({}))", column.name, list.join(", ")));
    }
    if let Some(fk) = &column.references {
        sql.push_str(&format!(
            " REFERENCES {}({}) ON DELETE {}",
            fk.table,
            fk.column,
            fk.on_delete.to_sql()
        ));
    }

    sql
}

fn render_type(column: &ColumnDef) -> String {
    if column.auto_increment {
        return match column.sql_type {
            SqlType::BigInt => "BIGSERIAL".to_string(),
            _ => "SERIAL".to_string(),
        };
    }
    column.sql_type.to_sql()
}

fn render_create_index(index: &IndexDef) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        unique,
        index.name(),
        index.table,
        index.columns.join(", ")
    )
}

fn render_insert(table: &str, row: &Row) -> (String, Vec<Value>) {
    let columns: Vec<&str> = row.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    (sql, row.values().cloned().collect())
}

fn render_delete(table: &str, filter: &Filter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for (column, value) in filter {
        match value {
            Value::Null => clauses.push(format!("{} IS NULL", column)),
            Value::Array(options) => {
                let placeholders: Vec<String> = options
                    .iter()
                    .map(|option| {
                        params.push(option.clone());
                        format!("${}", params.len())
                    })
                    .collect();
                clauses.push(format!("{} IN ({})", column, placeholders.join(", ")));
            }
            other => {
                params.push(other.clone());
                clauses.push(format!("{} = ${}", column, params.len()));
            }
        }
    }

    let sql = if clauses.is_empty() {
        format!("DELETE FROM {}", table)
    } else {
        format!("DELETE FROM {} WHERE {}", table, clauses.join(" AND "))
    };
    (sql, params)
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut out = Row::new();
    for column in row.columns() {
        out.insert(column.name().to_string(), decode_column(row, column)?);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, column: &PgColumn) -> Result<Value> {
    let idx = column.ordinal();
    let fail = |e: sqlx::Error| StrataError::Storage(format!("decode '{}': {}", column.name(), e));

    let value = match column.type_info().name() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .map_err(fail)?
            .map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map_err(fail)?
            .map(|v| Value::Number(v.into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map_err(fail)?
            .map(|v| Value::Number(v.into())),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .map_err(fail)?
            .map(|v| Value::Number(v.into())),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map_err(fail)?
            .and_then(|v| serde_json::Number::from_f64(v as f64))
            .map(Value::Number),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .map_err(fail)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .map_err(fail)?
            .map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .map_err(fail)?
            .map(|v| Value::String(v.and_utc().to_rfc3339())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx).map_err(fail)?,
        _ => row
            .try_get::<Option<String>, _>(idx)
            .map_err(fail)?
            .map(Value::String),
    };

    Ok(value.unwrap_or(Value::Null))
}
