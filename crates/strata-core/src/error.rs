use thiserror::Error;

use crate::script::Direction;

/// A transaction-control operation, used to report which one failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOp {
    Begin,
    Commit,
    Rollback,
}

impl std::fmt::Display for TxOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxOp::Begin => write!(f, "begin"),
            TxOp::Commit => write!(f, "commit"),
            TxOp::Rollback => write!(f, "rollback"),
        }
    }
}

/// Core error type for strata operations.
///
/// None of these are recovered internally: each aborts the current batch,
/// preserving everything committed earlier in that batch, and is returned
/// to the caller. Retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum StrataError {
    /// The script registry is unreadable or invalid (duplicate name,
    /// malformed numeric prefix, ledger entry with no registered script).
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The ledger table cannot be created or queried.
    #[error("Ledger init error: {0}")]
    LedgerInit(String),

    /// A script's apply/revert (or its in-transaction ledger write) failed.
    #[error("Script '{script}' failed during {direction}: {cause}")]
    ScriptExecution {
        script: String,
        direction: Direction,
        cause: String,
    },

    /// Transaction control itself failed, as opposed to the script logic.
    #[error("Transaction {op} failed: {cause}")]
    Transaction { op: TxOp, cause: String },

    /// Another runner holds the batch lock for this change-set.
    #[error("Change-set is locked: {0}")]
    LockHeld(String),

    /// A storage-level failure outside the categories above.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrataError {
    /// Wrap an arbitrary failure as a script-execution error for `script`
    /// running in `direction`.
    pub fn script(script: &str, direction: Direction, cause: impl std::fmt::Display) -> Self {
        StrataError::ScriptExecution {
            script: script.to_string(),
            direction,
            cause: cause.to_string(),
        }
    }
}

/// Result type alias using StrataError.
pub type Result<T> = std::result::Result<T, StrataError>;
