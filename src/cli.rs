//! CLI argument parsing for the autotrack-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "autotrack-worker", about = "AutoTrack maintenance reminder worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Fire one reminder run through a running worker, like the periodic job does
    Trigger {
        /// Override REMINDER_CRON_TIMEOUT_MS
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["autotrack-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["autotrack-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_trigger_command_parses() {
        let cli = Cli::parse_from(["autotrack-worker", "trigger"]);
        assert!(matches!(cli.command, Some(Command::Trigger { timeout_ms: None })));

        let cli = Cli::parse_from(["autotrack-worker", "trigger", "--timeout-ms", "5000"]);
        assert!(matches!(cli.command, Some(Command::Trigger { timeout_ms: Some(5000) })));
    }
}
