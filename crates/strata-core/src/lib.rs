pub mod config;
pub mod error;
pub mod executor;
pub mod report;
pub mod schema;
pub mod script;

pub use config::{ChangeSetConfig, DatabaseConfig, StrataConfig};
pub use error::{Result, StrataError, TxOp};
pub use executor::{BoxFuture, Executor, Filter, Row};
pub use report::{ApplyReport, ResetReport, RollbackReport, ScriptStatus, StatusReport};
pub use schema::{ColumnDef, ForeignKey, ForeignKeyAction, IndexDef, SqlType, TableDef};
pub use script::{ChangeScript, Direction, ScriptRegistry};
