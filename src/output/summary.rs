use anyhow::Result;
use std::io::Write;
use std::sync::Arc;

use crate::commit::CommitRecord;

use super::OutputSink;

/// Prints "Of N entries, M match." for the run
pub struct SummarySink<W: Write> {
    writer: W,
}

impl<W: Write> SummarySink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for SummarySink<W> {
    fn emit(&mut self, all: &[Arc<CommitRecord>], matched: &[Arc<CommitRecord>]) -> Result<()> {
        log::info!("{} of {} commits matched", matched.len(), all.len());
        writeln!(
            self.writer,
            "Of {} entries, {} match.",
            all.len(),
            matched.len()
        )?;
        self.writer.flush()?;
        Ok(())
    }
}
