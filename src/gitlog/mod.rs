//! Reading and parsing raw git history
//!
//! - `source`: obtains `git log --pretty=raw -z` output
//! - `parser`: turns that output into [`CommitRecord`](crate::commit::CommitRecord)s

mod parser;
mod source;

pub use parser::{Entries, LogParser, MESSAGE_INDENT, RECORD_SEPARATOR};
pub use source::{LogSource, GIT_LOG_ARGS};
