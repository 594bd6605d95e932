use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Result, ScanError};

/// Arguments that produce the raw, NUL-separated log the parser expects
pub const GIT_LOG_ARGS: [&str; 5] = [
    "log",
    "--pretty=raw",
    "--no-color",
    "--encoding=UTF-8",
    "-z",
];

/// Where the raw log text comes from
#[derive(Debug, Clone)]
pub enum LogSource {
    /// Run `git log` inside a repository, optionally limited to revisions
    Git {
        repo: PathBuf,
        revisions: Vec<String>,
    },
    /// A log previously dumped with the same arguments as [`GIT_LOG_ARGS`]
    File(PathBuf),
    Stdin,
}

impl LogSource {
    /// Read the whole log. Invalid UTF-8 is replaced rather than rejected.
    pub fn read(&self) -> Result<String> {
        match self {
            LogSource::Git { repo, revisions } => run_git_log(repo, revisions),
            LogSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    ScanError::LogSource(format!("failed to read {}: {}", path.display(), e))
                })?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            LogSource::Stdin => {
                let mut bytes = Vec::new();
                std::io::stdin().lock().read_to_end(&mut bytes)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            LogSource::Git { repo, .. } => format!("git repository {}", repo.display()),
            LogSource::File(path) => format!("log file {}", path.display()),
            LogSource::Stdin => "stdin".to_string(),
        }
    }
}

fn run_git_log(repo: &Path, revisions: &[String]) -> Result<String> {
    log::debug!("running git {} in {}", GIT_LOG_ARGS.join(" "), repo.display());

    let output = Command::new("git")
        .args(GIT_LOG_ARGS)
        .args(revisions)
        .current_dir(repo)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| {
            ScanError::LogSource(format!("failed to run git in {}: {}", repo.display(), e))
        })?;

    if !output.status.success() {
        return Err(ScanError::LogSource(format!(
            "git log in {} exited with {}",
            repo.display(),
            output.status
        )));
    }

    log::debug!("git log produced {} bytes", output.stdout.len());
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
