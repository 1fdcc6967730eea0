//! The data-store capability surface consumed by the engine.
//!
//! The engine never talks to a database driver directly. Everything it needs
//! (schema DDL, bulk row operations, parameterized raw queries, transactions)
//! goes through the [`Executor`] trait, so the same runner works against
//! Postgres in production and the in-memory fake in tests.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::Result;
use crate::schema::{IndexDef, TableDef};

/// Boxed future returned by capability methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A single row, keyed by column name.
///
/// Timestamp values cross this boundary as RFC 3339 strings.
pub type Row = serde_json::Map<String, Value>;

/// A delete condition, keyed by column name.
///
/// A scalar value means equality, an array means an IN-list, and `null`
/// means IS NULL. Multiple entries are ANDed together.
pub type Filter = serde_json::Map<String, Value>;

/// Capability surface over a relational store.
///
/// Implementations hold at most one transaction open at a time; after
/// [`begin`](Executor::begin), every operation runs inside that transaction
/// until [`commit`](Executor::commit) or [`rollback`](Executor::rollback).
pub trait Executor: Send + Sync {
    /// Create `table` if it does not already exist. Idempotent.
    fn create_table<'a>(&'a self, table: &'a TableDef) -> BoxFuture<'a, ()>;

    /// Drop the named table if it exists. Idempotent.
    fn drop_table<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ()>;

    /// Create a (possibly unique) index.
    fn add_index<'a>(&'a self, index: &'a IndexDef) -> BoxFuture<'a, ()>;

    /// Insert `rows` into `table`. Columns absent from a row take their
    /// declared defaults. Fails on primary-key conflicts.
    fn bulk_insert<'a>(&'a self, table: &'a str, rows: &'a [Row]) -> BoxFuture<'a, ()>;

    /// Delete rows matching `filter`, returning the number removed.
    fn bulk_delete<'a>(&'a self, table: &'a str, filter: &'a Filter) -> BoxFuture<'a, u64>;

    /// Run a parameterized read query (`$1`-style placeholders) and return
    /// the matching rows.
    fn query<'a>(&'a self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, Vec<Row>>;

    /// Run a parameterized statement, returning the affected-row count.
    fn execute<'a>(&'a self, sql: &'a str, params: &'a [Value]) -> BoxFuture<'a, u64>;

    /// Open a transaction.
    fn begin(&self) -> BoxFuture<'_, ()>;

    /// Commit the open transaction.
    fn commit(&self) -> BoxFuture<'_, ()>;

    /// Roll back the open transaction.
    fn rollback(&self) -> BoxFuture<'_, ()>;
}
