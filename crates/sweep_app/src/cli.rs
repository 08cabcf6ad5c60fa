//! Command-line surface of `inbox-sweep`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use sweep_engine::DEFAULT_API_BASE;
use sweep_logging::{LogDestination, LogSettings};

pub const DEFAULT_PURGE_QUERY: &str = "label:promotions has:nouserlabels before:30d";

#[derive(Parser, Debug)]
#[command(
    name = "inbox-sweep",
    about = "Find the domains filling your inbox and move their mail to trash",
    version,
    long_about = None
)]
pub struct Args {
    /// OAuth access token for the mail API
    #[arg(long, env = "INBOX_SWEEP_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Shell command that prints an access token; re-run when the token expires
    #[arg(
        long,
        env = "INBOX_SWEEP_TOKEN_COMMAND",
        conflicts_with = "token",
        global = true
    )]
    pub token_command: Option<String>,

    /// Directory holding the saved scan result and ignore list
    #[arg(
        long,
        env = "INBOX_SWEEP_STATE_DIR",
        default_value = ".inbox_sweep",
        global = true
    )]
    pub state_dir: PathBuf,

    /// Mail API base URL
    #[arg(long, default_value = DEFAULT_API_BASE, global = true)]
    pub api_base: String,

    /// Maximum metadata requests in flight while scanning
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..=100), global = true)]
    pub concurrency: u16,

    /// Number of domains to list
    #[arg(long, default_value_t = 20, global = true)]
    pub top: usize,

    /// Verbose logging (repeat for debug output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan the inbox and tally senders by domain
    Scan {
        /// Number of 500-message pages to read (1-50)
        #[arg(short, long)]
        pages: Option<u32>,
    },
    /// Show the last saved scan result
    Show,
    /// Move every unlabeled message from a domain to trash
    Trash {
        domain: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Move every message matching a search query to trash
    Purge {
        #[arg(long, default_value = DEFAULT_PURGE_QUERY)]
        query: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Exclude a domain from scans
    Ignore { domain: String },
    /// Include a previously ignored domain again
    Unignore { domain: String },
    /// List ignored domains
    Ignored,
}

impl Args {
    pub fn log_settings(&self) -> LogSettings {
        let level = match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        };
        let destination = match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        };
        LogSettings { level, destination }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_extension() {
        let args = Args::try_parse_from(["inbox-sweep", "purge"]).expect("parse");
        assert_eq!(
            args.command,
            Command::Purge {
                query: DEFAULT_PURGE_QUERY.to_string(),
                yes: false
            }
        );
        assert_eq!(args.concurrency, 10);
        assert_eq!(args.api_base, DEFAULT_API_BASE);
        assert_eq!(args.log_settings(), LogSettings::default());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let args = Args::try_parse_from([
            "inbox-sweep",
            "scan",
            "--pages",
            "7",
            "-vv",
            "--log-file",
            "sweep.log",
        ])
        .expect("parse");
        assert_eq!(args.command, Command::Scan { pages: Some(7) });
        assert_eq!(
            args.log_settings(),
            LogSettings {
                level: LevelFilter::Debug,
                destination: LogDestination::Both(PathBuf::from("sweep.log")),
            }
        );
    }

    #[test]
    fn token_sources_are_exclusive() {
        let result = Args::try_parse_from([
            "inbox-sweep",
            "--token",
            "abc",
            "--token-command",
            "gcloud auth print-access-token",
            "show",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn concurrency_must_be_positive() {
        assert!(Args::try_parse_from(["inbox-sweep", "--concurrency", "0", "show"]).is_err());
    }
}
