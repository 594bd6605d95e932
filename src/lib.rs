// Core library for the scanchanges commit scanner

pub mod cli;
pub mod commit;
pub mod config;
pub mod config_file;
pub mod error;
pub mod gitlog;
pub mod logging;
pub mod matcher;
pub mod output;
pub mod parallel;
pub mod platform;
pub mod remote;
pub mod timezone;

pub use commit::{CommitRecord, Signature};
pub use config::ScanConfig;
pub use error::{Result, ScanError};
pub use gitlog::{LogParser, LogSource};
pub use matcher::{KeywordMatcher, Matcher};
pub use output::{CsvSink, OutputSink, SummarySink};
pub use parallel::{scan_local, Coordinator, ParallelConfig, ScanOutcome, WorkerLoop};
pub use remote::{LeaderServer, RemoteWorkerChannels};
pub use timezone::{TimezoneCache, TimezoneValue};
