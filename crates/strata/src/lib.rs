//! Postgres change-set runner: the built-in schema migrations and data
//! seeds, the sqlx executor they run on, and the CLI that drives them.

pub mod changes;
pub mod cli;
pub mod pg;
pub mod seeds;

pub use pg::PgExecutor;
