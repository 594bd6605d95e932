use anyhow::Result;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;

use crate::config::ConfigError;
use crate::error::ScanError;

/// Exit codes, following sysexits(3) where one applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    Usage = 64,     // EX_USAGE
    DataError = 65, // EX_DATAERR
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }

    /// Pick the exit code for an error that reached `main`
    pub fn for_error(error: &anyhow::Error) -> Self {
        if error
            .chain()
            .any(|cause| cause.downcast_ref::<ConfigError>().is_some())
        {
            return ExitCode::Usage;
        }
        let data_error = error
            .chain()
            .filter_map(|cause| cause.downcast_ref::<ScanError>())
            .any(ScanError::is_data_error);
        if data_error {
            ExitCode::DataError
        } else {
            ExitCode::GeneralError
        }
    }
}

/// True when the error chain ends in a closed stdout pipe, e.g. `| head`
pub fn is_broken_pipe(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
            || cause
                .downcast_ref::<csv::Error>()
                .is_some_and(|e| {
                    matches!(e.kind(), csv::ErrorKind::Io(err) if err.kind() == io::ErrorKind::BrokenPipe)
                })
    })
}

/// Create a helpful error message for file creation failures
fn create_helpful_error_message(path: &Path, error: &io::Error) -> String {
    let base_msg = format!("Cannot create output file '{}': {}", path.display(), error);

    let suggestion = match error.kind() {
        io::ErrorKind::PermissionDenied => {
            "Suggestion: Check file permissions or choose a writable location"
        }
        io::ErrorKind::NotFound => "Suggestion: Parent directory does not exist, create it first",
        _ if path.is_dir() => "Suggestion: Path points to a directory, specify a filename instead",
        _ => return base_msg,
    };

    format!("{}\n{}", base_msg, suggestion)
}

/// Destination for scan results: a truncated file, or stdout
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => match File::create(path) {
            Ok(file) => Ok(Box::new(BufWriter::new(file))),
            Err(e) => Err(anyhow::anyhow!("{}", create_helpful_error_message(path, &e))),
        },
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}
