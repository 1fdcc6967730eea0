//! Testing utilities for strata change-sets.
//!
//! The runner's contract is exercised against [`MemoryExecutor`], an
//! in-memory implementation of the full executor surface with real
//! transaction semantics (snapshot on begin, restore on rollback). Use it to
//! test your own change scripts without a database.

mod executor;

pub use executor::{FailPoint, MemoryExecutor};
