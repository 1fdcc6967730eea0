use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

use strata_core::config::StrataConfig;
use strata_runtime::{BatchLock, ChangeSetRunner, Ledger};

use crate::pg::PgExecutor;
use crate::{changes, seeds};

/// Which registry and ledger a command operates on. `strata migrate` and
/// `strata seed` share the whole command surface; only this differs.
#[derive(Debug, Clone, Copy)]
pub enum ChangeSetKind {
    Migrations,
    Seeds,
}

impl ChangeSetKind {
    fn label(self) -> &'static str {
        match self {
            ChangeSetKind::Migrations => "Migrations",
            ChangeSetKind::Seeds => "Seeds",
        }
    }

    fn runner(self, config: &StrataConfig) -> ChangeSetRunner {
        match self {
            ChangeSetKind::Migrations => {
                ChangeSetRunner::new(changes::registry(), Ledger::new(&config.migrations.table))
            }
            ChangeSetKind::Seeds => {
                ChangeSetRunner::new(seeds::registry(), Ledger::new(&config.seeds.table))
            }
        }
    }
}

/// Run a change-set against the configured database.
#[derive(Parser)]
pub struct ChangeSetCommand {
    #[command(subcommand)]
    pub action: ChangeSetAction,

    /// Configuration file path.
    #[arg(short, long, default_value = "strata.toml", global = true)]
    pub config: String,

    /// Database URL (overrides the config file; falls back to DATABASE_URL).
    #[arg(long, global = true)]
    pub database_url: Option<String>,
}

#[derive(Subcommand)]
pub enum ChangeSetAction {
    /// Apply all pending scripts.
    Up,

    /// Revert the last N applied scripts.
    Down {
        /// Number of scripts to revert.
        #[arg(default_value = "1")]
        steps: usize,
    },

    /// Show per-script status.
    Status,

    /// Revert everything and drop the ledger table.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Remove a stale batch lock left behind by a crashed run.
    Unlock,
}

impl ChangeSetCommand {
    pub async fn execute(self, kind: ChangeSetKind) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let config = self.load_config()?;
        let exec = PgExecutor::connect(&config.database).await?;
        let runner = kind.runner(&config);

        println!();
        println!(
            "  {}  {} {}",
            style("▤").bold(),
            style("Strata").bold().cyan(),
            style(kind.label()).bold()
        );
        println!();

        match self.action {
            ChangeSetAction::Up => {
                println!("  {} Applying pending scripts...", style("→").dim());
                let report = runner.apply_all(&exec).await?;

                if report.executed.is_empty() {
                    println!("  {} Nothing to apply", style("ℹ").blue());
                } else {
                    for name in &report.executed {
                        println!("  {} Applied: {}", style("✓").green(), name);
                    }
                    println!();
                    println!(
                        "  {} Applied {} script(s)",
                        style("✓").green(),
                        report.total
                    );
                }
            }

            ChangeSetAction::Down { steps } => {
                if steps == 0 {
                    println!("  {} Nothing to revert (steps=0)", style("ℹ").blue());
                    println!();
                    return Ok(());
                }

                println!("  {} Reverting {} script(s)...", style("→").dim(), steps);
                let report = runner.rollback(&exec, steps).await?;

                if report.rolled_back.is_empty() {
                    println!("  {} Nothing to revert", style("ℹ").blue());
                } else {
                    for name in &report.rolled_back {
                        println!("  {} Reverted: {}", style("✓").green(), name);
                    }
                    println!();
                    println!(
                        "  {} Reverted {} script(s)",
                        style("✓").green(),
                        report.total
                    );
                }
            }

            ChangeSetAction::Status => {
                let report = runner.status(&exec).await?;

                if report.scripts.is_empty() {
                    println!("  {} No scripts registered", style("ℹ").blue());
                    println!();
                    return Ok(());
                }

                for script in &report.scripts {
                    if script.applied {
                        println!("  {} {}", style("✓").green(), style(&script.name).cyan());
                    } else {
                        println!("  {} {}", style("○").yellow(), style(&script.name).yellow());
                    }
                }
                println!();
                println!(
                    "  {} {} applied, {} pending, {} total",
                    style("ℹ").blue(),
                    report.executed,
                    report.pending,
                    report.total
                );
            }

            ChangeSetAction::Reset { yes } => {
                if !yes {
                    anyhow::bail!(
                        "reset reverts every applied script and drops the ledger table; \
                         re-run with --yes to confirm"
                    );
                }

                println!("  {} Resetting...", style("→").dim());
                let report = runner.reset(&exec).await?;
                println!(
                    "  {} Reverted {} script(s) and dropped the ledger",
                    style("✓").green(),
                    report.count
                );
            }

            ChangeSetAction::Unlock => {
                let lock = BatchLock::new(runner.ledger().table());
                if lock.force_release(&exec).await? {
                    println!("  {} Stale lock removed", style("✓").green());
                } else {
                    println!("  {} No lock held", style("ℹ").blue());
                }
            }
        }

        println!();
        Ok(())
    }

    fn load_config(&self) -> Result<StrataConfig> {
        let mut config = if Path::new(&self.config).exists() {
            StrataConfig::from_file(&self.config)?
        } else {
            let url = self
                .database_url
                .clone()
                .or_else(|| std::env::var("DATABASE_URL").ok());
            match url {
                Some(url) => StrataConfig::default_with_database_url(&url),
                None => anyhow::bail!(
                    "configuration file not found: {}\nCreate one or set DATABASE_URL.",
                    self.config
                ),
            }
        };

        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        Ok(config)
    }
}
