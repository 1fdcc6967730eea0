//! Change scripts and their registry.
//!
//! A change script is an identified pair of forward/inverse operations. The
//! registry is assembled explicitly at startup (no runtime code loading) and
//! hands scripts out in a deterministic total order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StrataError};
use crate::executor::{BoxFuture, Executor};

/// Which half of a script is being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Apply,
    Revert,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Apply => write!(f, "apply"),
            Direction::Revert => write!(f, "revert"),
        }
    }
}

/// An identified, ordered unit of change.
///
/// `name` doubles as the sort key and the ledger primary key, so it must
/// never change once the script has shipped. `revert` must undo exactly what
/// `apply` did; a script body is frozen the moment it has been applied
/// anywhere.
pub trait ChangeScript: Send + Sync + 'static {
    /// Unique identifier with a fixed-width numeric prefix,
    /// e.g. `001_create_users`.
    fn name(&self) -> &'static str;

    /// Forward operation. Runs at most once per store.
    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()>;

    /// Inverse operation.
    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()>;
}

impl fmt::Debug for dyn ChangeScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeScript")
            .field("name", &self.name())
            .finish()
    }
}

/// An explicit, statically-built collection of change scripts.
///
/// Registration order does not matter; discovery sorts ascending by name.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: Vec<Arc<dyn ChangeScript>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: ChangeScript>(&mut self, script: S) {
        self.scripts.push(Arc::new(script));
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// All registered scripts, validated and sorted ascending by name.
    ///
    /// Validation enforces the naming discipline the ordering depends on:
    /// every name carries a numeric prefix followed by `_`, all prefixes in
    /// one registry share the same digit width (so lexicographic order is
    /// numeric order), and names are unique.
    pub fn discover_all(&self) -> Result<Vec<Arc<dyn ChangeScript>>> {
        let mut seen = HashSet::new();
        let mut width = None;

        for script in &self.scripts {
            let name = script.name();
            let prefix = numeric_prefix_width(name).ok_or_else(|| {
                StrataError::Discovery(format!(
                    "script '{}' has no numeric prefix (expected a name like 001_description)",
                    name
                ))
            })?;

            match width {
                None => width = Some(prefix),
                Some(w) if w != prefix => {
                    return Err(StrataError::Discovery(format!(
                        "script '{}' has a {}-digit prefix but this set uses {}-digit \
                         prefixes; unpadded prefixes would corrupt the execution order",
                        name, prefix, w
                    )));
                }
                Some(_) => {}
            }

            if !seen.insert(name) {
                return Err(StrataError::Discovery(format!(
                    "duplicate script name '{}'",
                    name
                )));
            }
        }

        let mut sorted: Vec<_> = self.scripts.clone();
        sorted.sort_by_key(|s| s.name());
        Ok(sorted)
    }
}

/// Digit count of a leading `NNN_` prefix, or None if the name lacks one.
fn numeric_prefix_width(name: &str) -> Option<usize> {
    let digits = name.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &name[digits..];
    if rest.starts_with('_') && rest.len() > 1 {
        Some(digits)
    } else {
        None
    }
}
