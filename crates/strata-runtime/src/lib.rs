pub mod ledger;
pub mod lock;
pub mod runner;
pub mod testing;

pub use ledger::{Ledger, LedgerEntry};
pub use lock::BatchLock;
pub use runner::ChangeSetRunner;
