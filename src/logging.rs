//! Diagnostic logging setup
//!
//! Everything goes through the `log` facade and is written to stderr by
//! `env_logger`, so stdout stays reserved for scan results.

use log::LevelFilter;

/// Verbosity as requested on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Number of `-v` flags
    pub verbose: u8,
    /// `-q`: errors only
    pub quiet: bool,
}

impl LogConfig {
    pub fn new(verbose: u8, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Install the global logger. `RUST_LOG`, when set, overrides the level
/// derived from the flags. Later calls are ignored.
pub fn init(config: LogConfig) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(config.level())
        .format_timestamp(None)
        .target(env_logger::Target::Stderr);

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    let _ = builder.try_init();
}
