mod change_set;

pub use change_set::{ChangeSetAction, ChangeSetCommand, ChangeSetKind};

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Strata - ordered, reversible change-sets for Postgres
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage schema migrations.
    Migrate(ChangeSetCommand),

    /// Manage data seeds.
    Seed(ChangeSetCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Migrate(cmd) => cmd.execute(ChangeSetKind::Migrations).await,
            Commands::Seed(cmd) => cmd.execute(ChangeSetKind::Seeds).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_migrate_up() {
        let cli = Cli::try_parse_from(["strata", "migrate", "up"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_seed_down_steps() {
        let cli = Cli::try_parse_from(["strata", "seed", "down", "2"]).unwrap();
        match cli.command {
            Commands::Seed(cmd) => match cmd.action {
                ChangeSetAction::Down { steps } => assert_eq!(steps, 2),
                _ => panic!("expected down"),
            },
            _ => panic!("expected seed"),
        }
    }

    #[test]
    fn test_cli_parse_reset_requires_flag_to_confirm() {
        let cli = Cli::try_parse_from(["strata", "migrate", "reset"]).unwrap();
        match cli.command {
            Commands::Migrate(cmd) => match cmd.action {
                ChangeSetAction::Reset { yes } => assert!(!yes),
                _ => panic!("expected reset"),
            },
            _ => panic!("expected migrate"),
        }
    }

    #[test]
    fn test_cli_parse_unlock() {
        assert!(Cli::try_parse_from(["strata", "migrate", "unlock"]).is_ok());
    }
}
