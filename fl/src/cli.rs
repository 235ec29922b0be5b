//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Flitter - referee-coordinated worker directory
#[derive(Parser)]
#[command(
    name = "flitter",
    about = "Register workers under named groups and look them up by index",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/flitter/logs/"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run a referee hosting the name service
    Referee {
        /// Referee node path (<group>/<host>:<port>), defaults to the configured one
        #[arg(short, long, value_name = "PATH")]
        path: Option<String>,
    },

    /// Register a worker with the referee and wait for peer messages
    Worker {
        /// Worker node path (<group>/<host>:<port>)
        #[arg(short, long, value_name = "PATH")]
        path: String,

        /// Referee address (host:port or node path), defaults to the configured one
        #[arg(short, long, value_name = "ADDR")]
        referee: Option<String>,

        /// Seconds to wait for the registration reply
        #[arg(short, long, default_value = "10")]
        wait: u64,
    },

    /// Resolve the address of a group member by index
    Lookup {
        /// Group name
        group: String,

        /// Zero-based member index
        index: usize,

        /// Referee address (host:port or node path), defaults to the configured one
        #[arg(short, long, value_name = "ADDR")]
        referee: Option<String>,
    },

    /// Open or close the referee's busy gate for lookups
    Busy {
        /// Gate state to set
        #[arg(value_enum)]
        state: BusyState,

        /// Referee address (host:port or node path), defaults to the configured one
        #[arg(short, long, value_name = "ADDR")]
        referee: Option<String>,
    },
}

/// Busy gate state accepted by the `busy` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BusyState {
    On,
    Off,
}

impl BusyState {
    pub fn is_on(self) -> bool {
        self == BusyState::On
    }
}

impl Command {
    /// Short name used for the log file
    pub fn role(&self) -> &'static str {
        match self {
            Command::Referee { .. } => "referee",
            Command::Worker { .. } => "worker",
            Command::Lookup { .. } => "lookup",
            Command::Busy { .. } => "busy",
        }
    }
}

/// Directory log files are written to
pub fn get_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flitter")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lookup() {
        let cli = Cli::try_parse_from(["flitter", "lookup", "groupA", "3", "-r", "10.0.0.9:5000"]).unwrap();
        match cli.command {
            Command::Lookup { group, index, referee } => {
                assert_eq!(group, "groupA");
                assert_eq!(index, 3);
                assert_eq!(referee.as_deref(), Some("10.0.0.9:5000"));
            }
            _ => panic!("expected lookup"),
        }
    }

    #[test]
    fn test_parse_worker_with_globals() {
        let cli = Cli::try_parse_from(["flitter", "-v", "worker", "-p", "g/127.0.0.1:9000", "-c", "f.yml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("f.yml")));
        assert_eq!(cli.command.role(), "worker");
    }

    #[test]
    fn test_parse_busy() {
        let cli = Cli::try_parse_from(["flitter", "busy", "on"]).unwrap();
        match cli.command {
            Command::Busy { state, referee } => {
                assert!(state.is_on());
                assert!(referee.is_none());
            }
            _ => panic!("expected busy"),
        }
        assert!(Cli::try_parse_from(["flitter", "busy", "maybe"]).is_err());
    }

    #[test]
    fn test_worker_requires_path() {
        assert!(Cli::try_parse_from(["flitter", "worker"]).is_err());
    }
}
