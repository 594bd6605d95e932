//! Output sinks for a finished scan
//!
//! A sink sees the full parsed history and the matched subsequence, already
//! back in commit order.

mod csv;
mod summary;

pub use self::csv::{CsvSink, DateField};
pub use self::summary::SummarySink;

use anyhow::Result;
use std::sync::Arc;

use crate::commit::CommitRecord;

pub trait OutputSink {
    fn emit(&mut self, all: &[Arc<CommitRecord>], matched: &[Arc<CommitRecord>]) -> Result<()>;
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn emit(&mut self, all: &[Arc<CommitRecord>], matched: &[Arc<CommitRecord>]) -> Result<()> {
        (**self).emit(all, matched)
    }
}

/// Runs several sinks in order, stopping at the first failure
#[derive(Default)]
pub struct SinkChain {
    sinks: Vec<Box<dyn OutputSink>>,
}

impl SinkChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: OutputSink + 'static>(&mut self, sink: S) -> &mut Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl OutputSink for SinkChain {
    fn emit(&mut self, all: &[Arc<CommitRecord>], matched: &[Arc<CommitRecord>]) -> Result<()> {
        for sink in &mut self.sinks {
            sink.emit(all, matched)?;
        }
        Ok(())
    }
}
