//! CLI module for lean-client
//!
//! Provides command-line interface using clap derive macros.

pub mod commands;
pub mod location;
pub mod output;
pub mod response;

pub use location::ParsedLocation;
pub use output::OutputContext;

use clap::{Parser, Subcommand};

use commands::{
    config::ConfigArgs, diagnostics::DiagnosticsArgs, goal::GoalArgs, refresh::RefreshArgs,
};

const LONG_ABOUT: &str = r#"
lean-client - drive a Lean 4 language server from the command line

Starts `lean --server` in the current directory, forwards one request and
prints the result as JSON.

EXAMPLES:
  lean-client goal Main.lean:12:5            # Proof state at a position
  lean-client diagnostics Main.lean          # Errors and warnings
  lean-client refresh Main.lean              # Re-elaborate after imports changed
  lean-client config init                    # Write .lean-client/config.toml

ENVIRONMENT:
  LEAN4_EXECUTABLE_PATH          Lean executable (default: lean)
  LEAN4_SERVER_LOGGING_ENABLED   Ask the server to write its own logs
  LEAN4_SERVER_LOGGING_PATH      Directory for server logs
  RUST_LOG                       Client log filter (e.g. lean_client=debug)
"#;

#[derive(Parser, Debug)]
#[command(name = "lean-client")]
#[command(author, version, about, long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
#[command(after_help = "Use 'lean-client <COMMAND> --help' for more information about a command.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the plain-text goal state at a position
    Goal(GoalArgs),

    /// Show diagnostics for a file
    Diagnostics(DiagnosticsArgs),

    /// Close and reopen a file so its imports are rebuilt
    Refresh(RefreshArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_goal() {
        let cli = Cli::try_parse_from(["lean-client", "goal", "Main.lean:3:5"]).unwrap();
        match cli.command {
            Commands::Goal(args) => assert_eq!(args.location, "Main.lean:3:5"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_diagnostics_wait() {
        let cli =
            Cli::try_parse_from(["lean-client", "diagnostics", "Main.lean", "--wait-ms", "250"])
                .unwrap();
        match cli.command {
            Commands::Diagnostics(args) => assert_eq!(args.wait_ms, 250),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
