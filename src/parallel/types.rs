//! Type definitions for the job protocol
//!
//! Contains the messages exchanged over the work and result queues, the
//! reports produced by workers and the leader, and the pool configuration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::commit::CommitRecord;
use crate::error::Result;

/// Configuration for a local worker pool
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    pub num_workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
        }
    }
}

/// A record handed to a worker, tagged with its position in the submitted
/// sequence so the leader can restore commit order afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub seq: usize,
    pub record: Arc<CommitRecord>,
}

/// Message type for distributing work to workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkMessage {
    Job(Job),
    /// Sentinel queued once after the last job; every worker relays it
    EndOfWork,
}

/// Message type for reporting back to the leader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultMessage {
    WorkerStart,
    WorkerStop,
    Match(Job),
}

/// What the leader saw while draining the result queue
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Matches in the order they were reported
    pub matches: Vec<Job>,
    pub workers_started: usize,
    pub workers_stopped: usize,
    /// Stop markers that arrived with no worker outstanding
    pub protocol_violations: usize,
}

/// Per-worker counters returned when a worker exits cleanly
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub processed: usize,
    pub matched: usize,
}

/// Worker side of the job protocol.
///
/// Implemented over in-process channels and over the remote transport, so
/// the same [`WorkerLoop`](super::WorkerLoop) drives both.
pub trait WorkerChannels {
    /// Block until a job or the end-of-work sentinel is available
    fn pull_next(&mut self) -> Result<WorkMessage>;

    /// Put the end-of-work sentinel back for the next worker
    fn relay_end_of_work(&mut self) -> Result<()>;

    fn report_start(&mut self) -> Result<()>;

    fn report_match(&mut self, job: Job) -> Result<()>;

    fn report_stop(&mut self) -> Result<()>;
}

impl<T: WorkerChannels + ?Sized> WorkerChannels for &mut T {
    fn pull_next(&mut self) -> Result<WorkMessage> {
        (**self).pull_next()
    }

    fn relay_end_of_work(&mut self) -> Result<()> {
        (**self).relay_end_of_work()
    }

    fn report_start(&mut self) -> Result<()> {
        (**self).report_start()
    }

    fn report_match(&mut self, job: Job) -> Result<()> {
        (**self).report_match(job)
    }

    fn report_stop(&mut self) -> Result<()> {
        (**self).report_stop()
    }
}
