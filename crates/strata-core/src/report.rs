//! Structured results returned by the runner's command surface.

use serde::Serialize;

/// Result of an apply-all batch: the scripts committed by this invocation,
/// in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub executed: Vec<String>,
    pub total: usize,
}

impl ApplyReport {
    pub fn new(executed: Vec<String>) -> Self {
        let total = executed.len();
        Self { executed, total }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Result of a rollback batch: the scripts reverted by this invocation,
/// most recently applied first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub rolled_back: Vec<String>,
    pub total: usize,
}

impl RollbackReport {
    pub fn new(rolled_back: Vec<String>) -> Self {
        let total = rolled_back.len();
        Self { rolled_back, total }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Per-script line of a status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptStatus {
    pub name: String,
    pub applied: bool,
}

/// Snapshot of a change-set's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub total: usize,
    pub executed: usize,
    pub pending: usize,
    pub scripts: Vec<ScriptStatus>,
}

impl StatusReport {
    /// Build a report from per-script flags. Counts derive from the flags,
    /// so `total == executed + pending` holds by construction.
    pub fn from_scripts(scripts: Vec<ScriptStatus>) -> Self {
        let total = scripts.len();
        let executed = scripts.iter().filter(|s| s.applied).count();
        Self {
            total,
            executed,
            pending: total - executed,
            scripts,
        }
    }
}

/// Result of a reset: every applied script reverted and the ledger dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub reset: bool,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_counts_derive_from_flags() {
        let report = StatusReport::from_scripts(vec![
            ScriptStatus {
                name: "001_a".into(),
                applied: true,
            },
            ScriptStatus {
                name: "002_b".into(),
                applied: false,
            },
            ScriptStatus {
                name: "003_c".into(),
                applied: false,
            },
        ]);

        assert_eq!(report.total, 3);
        assert_eq!(report.executed, 1);
        assert_eq!(report.pending, 2);
        assert_eq!(report.total, report.executed + report.pending);
    }

    #[test]
    fn test_empty_status() {
        let report = StatusReport::from_scripts(Vec::new());
        assert_eq!(report.total, 0);
        assert_eq!(report.executed, 0);
        assert_eq!(report.pending, 0);
    }

    #[test]
    fn test_apply_report_total_tracks_list() {
        let report = ApplyReport::new(vec!["001_a".into(), "002_b".into()]);
        assert_eq!(report.total, 2);
        assert!(ApplyReport::empty().executed.is_empty());
    }
}
