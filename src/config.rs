//! Merged, validated configuration
//!
//! Command-line values win over config-file values, which win over the
//! built-in defaults.

use std::path::PathBuf;

use crate::cli::{MatchArgs, RemoteArgs, SourceArgs};
use crate::config_file::ConfigFile;
use crate::gitlog::LogSource;
use crate::matcher::{KeywordMatcher, DEFAULT_KEYWORDS};
use crate::output::DateField;
use crate::parallel::ParallelConfig;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 50505;

/// Invalid combination of settings; reported as a usage error
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// How commits are classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    Keywords(Vec<String>),
    Pattern(String),
}

impl Default for MatchRule {
    fn default() -> Self {
        MatchRule::Keywords(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }
}

/// Settings that may come from the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub threads: Option<usize>,
    pub date_field: Option<DateField>,
    pub keywords: Option<Vec<String>>,
    pub pattern: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secret: Option<String>,
}

impl Overrides {
    pub fn with_matching(mut self, args: &MatchArgs) -> Self {
        self.keywords = args.keywords.clone();
        self.pattern = args.pattern.clone();
        self
    }

    pub fn with_remote(mut self, args: &RemoteArgs) -> Self {
        self.host = args.host.clone();
        self.port = args.port;
        self.secret = args.secret.clone();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub threads: usize,
    pub date_field: DateField,
    pub rule: MatchRule,
    pub host: String,
    pub port: u16,
    pub secret: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: ParallelConfig::default().num_workers,
            date_field: DateField::default(),
            rule: MatchRule::default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secret: None,
        }
    }
}

impl ScanConfig {
    pub fn resolve(cli: &Overrides, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let threads = match cli.threads {
            Some(n) => n,
            None => parse_key(file, "threads")?.unwrap_or(defaults.threads),
        };
        if threads == 0 {
            return Err(ConfigError("threads must be at least 1".to_string()));
        }

        let date_field = match cli.date_field {
            Some(field) => field,
            None => parse_key(file, "date-field")?.unwrap_or(defaults.date_field),
        };

        let rule = match (&cli.keywords, &cli.pattern) {
            (Some(keywords), _) => MatchRule::Keywords(keywords.clone()),
            (None, Some(pattern)) => MatchRule::Pattern(pattern.clone()),
            (None, None) => match (file.get("keywords"), file.get("pattern")) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError(
                        "config sets both 'keywords' and 'pattern'; keep one".to_string(),
                    ))
                }
                (Some(list), None) => MatchRule::Keywords(list.split(',').map(str::to_string).collect()),
                (None, Some(pattern)) => MatchRule::Pattern(pattern.to_string()),
                (None, None) => defaults.rule,
            },
        };
        if let MatchRule::Keywords(keywords) = &rule {
            if keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(ConfigError("keyword list is empty".to_string()));
            }
        }

        let host = cli
            .host
            .clone()
            .or_else(|| file.get("host").map(str::to_string))
            .unwrap_or(defaults.host);
        let port = match cli.port {
            Some(port) => port,
            None => parse_key(file, "port")?.unwrap_or(defaults.port),
        };
        let secret = cli
            .secret
            .clone()
            .or_else(|| file.get("secret").map(str::to_string));

        Ok(Self {
            threads,
            date_field,
            rule,
            host,
            port,
            secret,
        })
    }

    pub fn parallel(&self) -> ParallelConfig {
        ParallelConfig {
            num_workers: self.threads,
        }
    }

    pub fn matcher(&self) -> Result<KeywordMatcher, ConfigError> {
        let built = match &self.rule {
            MatchRule::Keywords(keywords) => KeywordMatcher::new(keywords),
            MatchRule::Pattern(pattern) => KeywordMatcher::with_pattern(pattern),
        };
        built.map_err(|e| ConfigError(format!("{:#}", e)))
    }

    /// Raw bytes of the shared secret; distributed mode refuses to run without one
    pub fn secret_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        match self.secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret.as_bytes().to_vec()),
            _ => Err(ConfigError(
                "a shared secret is required: pass --secret, set SCANCHANGES_SECRET or add 'secret' to the config file".to_string(),
            )),
        }
    }

    pub fn address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

/// Map the source arguments to a log source. `-` reads stdin.
pub fn log_source(args: &SourceArgs) -> LogSource {
    match &args.log_file {
        Some(path) if path.as_os_str() == "-" => LogSource::Stdin,
        Some(path) => LogSource::File(path.clone()),
        None => LogSource::Git {
            repo: args.repo.clone().unwrap_or_else(|| PathBuf::from(".")),
            revisions: args.revisions.clone(),
        },
    }
}

fn parse_key<T>(file: &ConfigFile, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    file.get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                ConfigError(format!("invalid value '{}' for config key '{}': {}", raw, key, e))
            })
        })
        .transpose()
}
