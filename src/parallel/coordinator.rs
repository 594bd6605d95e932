//! Leader-side orchestration
//!
//! The coordinator seeds the work queue, drains the result queue and puts
//! matches back into commit order.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use crate::commit::CommitRecord;
use crate::error::{Result, ScanError};
use crate::matcher::Matcher;

use super::distributor::JobDistributor;
use super::types::{DrainReport, ParallelConfig, WorkerChannels, WorkerSummary};
use super::worker::WorkerLoop;

/// Matches of one run, in original commit order
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub matched: Vec<Arc<CommitRecord>>,
    pub workers: usize,
    pub protocol_violations: usize,
}

pub struct Coordinator {
    distributor: JobDistributor,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(JobDistributor::new())
    }
}

impl Coordinator {
    pub fn new(distributor: JobDistributor) -> Self {
        Self { distributor }
    }

    /// Queues for attaching workers, local or remote
    pub fn distributor(&self) -> &JobDistributor {
        &self.distributor
    }

    /// Submit all records, wait for every worker to finish and return the
    /// relevant records as a subsequence of `records`.
    ///
    /// A coordinator runs once. Calling this again fails with
    /// [`ScanError::ProtocolViolation`] before anything is queued.
    pub fn run(&self, records: &[Arc<CommitRecord>]) -> Result<ScanOutcome> {
        self.distributor.submit_all(records.iter().cloned())?;
        let report = self.distributor.drain_results()?;
        Ok(restore_commit_order(records, report))
    }
}

/// Order matches by submission index, dropping anything that is not exactly
/// one of the submitted records.
fn restore_commit_order(records: &[Arc<CommitRecord>], report: DrainReport) -> ScanOutcome {
    let mut protocol_violations = report.protocol_violations;
    let mut seen = HashSet::new();
    let mut seqs = Vec::with_capacity(report.matches.len());

    for job in report.matches {
        let genuine = records
            .get(job.seq)
            .is_some_and(|original| **original == *job.record);
        if !genuine {
            protocol_violations += 1;
            log::warn!(
                "{}",
                ScanError::ProtocolViolation(format!(
                    "match #{} ({}) does not correspond to a submitted record",
                    job.seq, job.record.commit
                ))
            );
            continue;
        }
        if !seen.insert(job.seq) {
            protocol_violations += 1;
            log::warn!(
                "{}",
                ScanError::ProtocolViolation(format!("match #{} reported twice", job.seq))
            );
            continue;
        }
        seqs.push(job.seq);
    }

    seqs.sort_unstable();
    ScanOutcome {
        matched: seqs.into_iter().map(|seq| Arc::clone(&records[seq])).collect(),
        workers: report.workers_started,
        protocol_violations,
    }
}

/// Start `count` worker threads, each over the channel handle built for it.
///
/// Every handle is built before the first thread starts, so a failed
/// connection leaves no worker running behind the caller's back.
pub fn spawn_workers<C, F>(
    count: usize,
    matcher: &Arc<dyn Matcher>,
    channels: F,
) -> Result<Vec<WorkerHandle>>
where
    C: WorkerChannels + Send + 'static,
    F: FnMut(usize) -> Result<C>,
{
    let channels = (0..count).map(channels).collect::<Result<Vec<C>>>()?;

    channels
        .into_iter()
        .enumerate()
        .map(|(id, channels)| {
            let worker = WorkerLoop::new(id, channels, Arc::clone(matcher));
            let handle = thread::Builder::new()
                .name(format!("scan-worker-{}", id))
                .spawn(move || worker.run())?;
            Ok(handle)
        })
        .collect()
}

pub type WorkerHandle = thread::JoinHandle<Result<WorkerSummary>>;

/// Wait for every worker and add up their counters. The first failure is
/// returned after all threads have been joined.
pub fn join_workers(handles: Vec<WorkerHandle>) -> Result<WorkerSummary> {
    let mut total = WorkerSummary::default();
    let mut first_error = None;

    for handle in handles {
        let result = handle
            .join()
            .map_err(|_| ScanError::Transport("worker thread panicked".to_string()))
            .and_then(|result| result);
        match result {
            Ok(summary) => {
                total.processed += summary.processed;
                total.matched += summary.matched;
            }
            Err(e) => {
                log::error!("{}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(total),
    }
}

/// Classify `records` with a pool of local worker threads
pub fn scan_local(
    records: &[Arc<CommitRecord>],
    matcher: Arc<dyn Matcher>,
    config: &ParallelConfig,
) -> Result<ScanOutcome> {
    let coordinator = Coordinator::default();
    let num_workers = config.num_workers.max(1);

    let handles = spawn_workers(num_workers, &matcher, |_| {
        Ok(coordinator.distributor().worker_channels())
    })?;

    log::info!(
        "scanning {} commits with {} worker threads",
        records.len(),
        num_workers
    );
    let outcome = coordinator.run(records)?;

    let total = join_workers(handles)?;
    log::debug!(
        "workers processed {} commits, {} matched",
        total.processed,
        total.matched
    );

    Ok(outcome)
}
