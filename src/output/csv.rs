use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;

use crate::commit::CommitRecord;

use super::OutputSink;

/// Which signature's date goes in the second CSV column
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DateField {
    #[default]
    Committer,
    Author,
}

impl DateField {
    pub fn field_name(self) -> &'static str {
        match self {
            DateField::Committer => "committer.date",
            DateField::Author => "author.date",
        }
    }
}

impl std::str::FromStr for DateField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "committer" | "committer.date" => Ok(DateField::Committer),
            "author" | "author.date" => Ok(DateField::Author),
            other => Err(format!(
                "unknown date field '{}', expected 'committer' or 'author'",
                other
            )),
        }
    }
}

/// Writes one row per matched commit: hash, date, message
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    columns: [&'static str; 3],
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, date_field: DateField) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(writer),
            columns: ["commit", date_field.field_name(), "commit message"],
        }
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))
    }
}

impl<W: Write> OutputSink for CsvSink<W> {
    fn emit(&mut self, _all: &[Arc<CommitRecord>], matched: &[Arc<CommitRecord>]) -> Result<()> {
        self.writer
            .write_record(self.columns)
            .context("Failed to write CSV header")?;
        for record in matched {
            let row = self
                .columns
                .iter()
                .map(|column| record.get(column).unwrap_or_default());
            self.writer
                .write_record(row)
                .with_context(|| format!("Failed to write CSV row for {}", record.commit))?;
        }
        self.writer.flush().context("Failed to flush CSV output")?;
        Ok(())
    }
}
