// Command-line interface definitions
// Values left unset here fall back to the config file, then to defaults

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::DateField;

#[derive(Parser, Debug)]
#[command(name = "scanchanges")]
#[command(about = "Scan a git history for security-relevant commits")]
#[command(
    long_about = "Scan a git history for security-relevant commits\n\nEvery commit message is matched against a keyword list and the matching commits are written as CSV, in history order.\n\nMODES:\n  scan     Classify with a pool of local worker threads\n  lead     Serve the history to followers on other hosts and collect their matches\n  follow   Connect to a leader and classify the commits it hands out\n\nCOMMON EXAMPLES:\n  scanchanges scan ~/src/project\n  scanchanges scan --log-file dump.log --date-field author\n  scanchanges lead ~/src/project --port 50505 --secret s3cret\n  scanchanges follow --host leader.lan --port 50505 --secret s3cret"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true, help_heading = "Logging Options")]
    pub verbose: u8,

    /// Only report errors
    #[arg(short = 'q', long = "quiet", global = true, help_heading = "Logging Options")]
    pub quiet: bool,

    /// Read configuration from this file instead of the default locations
    #[arg(long = "config-file", global = true, help_heading = "Configuration Options")]
    pub config_file: Option<PathBuf>,

    /// Ignore all configuration files
    #[arg(
        long = "ignore-config",
        global = true,
        conflicts_with = "config_file",
        help_heading = "Configuration Options"
    )]
    pub ignore_config: bool,

    /// Print the merged configuration and where it came from, then exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan with local worker threads
    Scan(ScanArgs),
    /// Lead a distributed scan
    Lead(LeadArgs),
    /// Work for a leader on another host
    Follow(FollowArgs),
}

/// Where the history comes from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Repository to run `git log` in (default: current directory)
    #[arg(conflicts_with = "log_file")]
    pub repo: Option<PathBuf>,

    /// Read a pre-dumped `git log --pretty=raw -z` file instead of running git ("-" for stdin)
    #[arg(long = "log-file", help_heading = "Input Options")]
    pub log_file: Option<PathBuf>,

    /// Revisions and paths passed through to `git log`, after `--`
    #[arg(last = true, conflicts_with = "log_file")]
    pub revisions: Vec<String>,
}

/// How commits are classified
#[derive(Args, Debug, Clone, Default)]
pub struct MatchArgs {
    /// Comma-separated keywords replacing the built-in security list
    #[arg(
        long = "keywords",
        value_delimiter = ',',
        help_heading = "Matching Options"
    )]
    pub keywords: Option<Vec<String>>,

    /// Case-insensitive regular expression used instead of a keyword list
    #[arg(
        long = "pattern",
        conflicts_with = "keywords",
        help_heading = "Matching Options"
    )]
    pub pattern: Option<String>,
}

/// What is written once the scan is done
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Date column of the CSV output
    #[arg(long = "date-field", value_enum, help_heading = "Output Options")]
    pub date_field: Option<DateField>,

    /// Write CSV to this file instead of stdout
    #[arg(short = 'o', long = "output", help_heading = "Output Options")]
    pub output: Option<PathBuf>,

    /// Print "Of N entries, M match." to stderr after the CSV
    #[arg(long = "summary", help_heading = "Output Options")]
    pub summary: bool,
}

/// Leader address and shared secret
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Host to listen on (lead) or connect to (follow)
    #[arg(long = "host", help_heading = "Remote Options")]
    pub host: Option<String>,

    /// TCP port of the leader
    #[arg(long = "port", help_heading = "Remote Options")]
    pub port: Option<u16>,

    /// Shared secret authenticating leader and followers
    #[arg(
        long = "secret",
        env = "SCANCHANGES_SECRET",
        hide_env_values = true,
        help_heading = "Remote Options"
    )]
    pub secret: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub matching: MatchArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Number of worker threads (default: number of CPUs)
    #[arg(short = 'j', long = "threads", help_heading = "Performance Options")]
    pub threads: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LeadArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub matching: MatchArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Worker threads run by the leader itself alongside remote followers
    #[arg(
        long = "local-workers",
        default_value_t = 0,
        help_heading = "Performance Options"
    )]
    pub local_workers: usize,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FollowArgs {
    #[command(flatten)]
    pub matching: MatchArgs,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Number of connections, each with its own worker (default: number of CPUs)
    #[arg(short = 'j', long = "threads", help_heading = "Performance Options")]
    pub threads: Option<usize>,
}
