use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

/// Keys understood in a config file
pub const KNOWN_KEYS: &[&str] = &[
    "threads",
    "date-field",
    "keywords",
    "pattern",
    "host",
    "port",
    "secret",
];

const PROJECT_FILE: &str = ".scanchangesrc";

/// Configuration file handler for scanchanges
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub values: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Find project-level .scanchangesrc by walking up directory tree
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;
        loop {
            let config_path = current.join(PROJECT_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// Get list of user config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("scanchanges").join("config.ini"));
            }
            if let Ok(userprofile) = env::var("USERPROFILE") {
                paths.push(PathBuf::from(userprofile).join(PROJECT_FILE));
            }
        } else {
            // $XDG_CONFIG_HOME/scanchanges/config.ini, then ~/.scanchangesrc
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });

            paths.push(xdg_config.join("scanchanges").join("config.ini"));

            if let Ok(home) = env::var("HOME") {
                paths.push(PathBuf::from(home).join(PROJECT_FILE));
            }
        }

        paths
    }

    /// Load configuration with proper precedence: project > user > defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // First existing user file only, lowest precedence
        if let Some(path) = Self::get_user_config_paths()
            .into_iter()
            .find(|p| p.exists())
        {
            config = Self::merge_configs(config, Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = Self::merge_configs(config, Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    /// Load configuration with optional custom config file path
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        log::debug!("loaded config file {}", path.display());
        Ok(Self::parse_ini_content(&content))
    }

    /// Parse INI content from string.
    ///
    /// Keys may sit at the root or in any section; sections only group
    /// them for readability. Unknown keys are reported and skipped.
    fn parse_ini_content(content: &str) -> Self {
        let mut values = BTreeMap::new();

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                log::warn!("config line {} ignored: expected key = value", number + 1);
                continue;
            };
            let key = key.trim();
            if !KNOWN_KEYS.contains(&key) {
                log::warn!("unknown config key '{}' ignored", key);
                continue;
            }
            values.insert(key.to_string(), value.trim().to_string());
        }

        Self { values }
    }

    /// Merge two configuration objects, with the second taking precedence
    fn merge_configs(base: Self, overlay: Self) -> Self {
        let mut values = base.values;
        values.extend(overlay.values);
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Show configuration information with precedence details
    pub fn show_config() {
        println!(
            "Configuration precedence: CLI > project {} > user config > defaults\n",
            PROJECT_FILE
        );

        let project_config_path = Self::find_project_config();
        let user_config_paths = Self::get_user_config_paths();
        let user_config_path = user_config_paths.iter().find(|p| p.exists());

        match Self::load() {
            Ok(merged_config) => {
                let mut loaded_from = Vec::new();
                if let Some(project_path) = &project_config_path {
                    loaded_from.push(format!("Project: {}", project_path.display()));
                }
                if let Some(user_path) = user_config_path {
                    loaded_from.push(format!("User: {}", user_path.display()));
                }

                if loaded_from.is_empty() {
                    println!("No configuration files found. Using defaults.");
                } else {
                    println!("Configuration loaded from:");
                    for source in loaded_from {
                        println!("  {}", source);
                    }
                }

                if !merged_config.values.is_empty() {
                    println!("\nActive settings:");
                    for (key, value) in &merged_config.values {
                        let shown = if key == "secret" { "********" } else { value };
                        println!("  {} = {}", key, shown);
                    }
                }
            }
            Err(e) => {
                eprintln!("Error loading configuration: {:#}", e);
            }
        }

        println!("\nConfiguration search locations (in precedence order):");
        match &project_config_path {
            Some(project_path) => println!("  1. Project: {} (found)", project_path.display()),
            None => println!(
                "  1. Project: {} (searched up directory tree, not found)",
                PROJECT_FILE
            ),
        }
        for (i, path) in user_config_paths.iter().enumerate() {
            let status = if path.exists() {
                "(found)"
            } else {
                "(not found)"
            };
            println!("  {}. User: {} {}", i + 2, path.display(), status);
        }

        if project_config_path.is_none() && user_config_path.is_none() {
            println!("\nExample configuration file ({}):", PROJECT_FILE);
            println!();
            println!("threads = 8");
            println!("date-field = author");
            println!("keywords = cve,exploit,vulnerab,xss");
            println!();
            println!("[remote]");
            println!("host = 0.0.0.0");
            println!("port = 50505");
        }
    }
}
