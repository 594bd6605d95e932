//! Shared work and result queues
//!
//! The leader pushes every job followed by a single end-of-work sentinel.
//! Workers relay the sentinel before exiting, so the pool shuts down without
//! the leader knowing how many workers exist. The leader instead counts
//! start/stop markers on the result queue and stops draining when the count
//! drops back to zero.
//!
//! A worker that dies after reporting start but before reporting stop leaves
//! the leader waiting forever. There is no heartbeat or timeout.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::commit::CommitRecord;
use crate::error::{Result, ScanError};

use super::types::{DrainReport, Job, ResultMessage, WorkMessage, WorkerChannels};

/// Owner of the two FIFO queues shared by the leader and its workers.
///
/// A distributor serves exactly one run: the relayed sentinel stays on the
/// work queue afterwards, so a second batch would be cut off by it.
#[derive(Debug)]
pub struct JobDistributor {
    work_sender: Sender<WorkMessage>,
    work_receiver: Receiver<WorkMessage>,
    result_sender: Sender<ResultMessage>,
    result_receiver: Receiver<ResultMessage>,
    submitted: AtomicBool,
}

impl Default for JobDistributor {
    fn default() -> Self {
        Self::new()
    }
}

impl JobDistributor {
    pub fn new() -> Self {
        let (work_sender, work_receiver) = unbounded();
        let (result_sender, result_receiver) = unbounded();
        Self {
            work_sender,
            work_receiver,
            result_sender,
            result_receiver,
            submitted: AtomicBool::new(false),
        }
    }

    /// Handle for one worker. Any number can be created; each message on the
    /// work queue is received by exactly one of them.
    pub fn worker_channels(&self) -> LocalWorkerChannels {
        LocalWorkerChannels {
            work_sender: self.work_sender.clone(),
            work_receiver: self.work_receiver.clone(),
            result_sender: self.result_sender.clone(),
        }
    }

    /// Queue every record in order, then exactly one end-of-work sentinel.
    /// Returns the number of jobs queued. Fails if this distributor has
    /// already been given a batch.
    pub fn submit_all<I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = Arc<CommitRecord>>,
    {
        if self.submitted.swap(true, Ordering::SeqCst) {
            return Err(ScanError::ProtocolViolation(
                "jobs already submitted to this distributor; start a new one per run".to_string(),
            ));
        }

        let mut queued = 0;
        for (seq, record) in records.into_iter().enumerate() {
            self.work_sender
                .send(WorkMessage::Job(Job { seq, record }))
                .map_err(|_| ScanError::ChannelClosed)?;
            queued += 1;
        }
        self.work_sender
            .send(WorkMessage::EndOfWork)
            .map_err(|_| ScanError::ChannelClosed)?;

        log::debug!("submitted {} jobs", queued);
        Ok(queued)
    }

    /// Collect matches until every worker that reported start has reported stop.
    ///
    /// Returns only after at least one worker has started, so calling this
    /// before any worker connects simply waits.
    pub fn drain_results(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        let mut outstanding: usize = 0;

        loop {
            let message = self
                .result_receiver
                .recv()
                .map_err(|_| ScanError::ChannelClosed)?;

            match message {
                ResultMessage::WorkerStart => {
                    outstanding += 1;
                    report.workers_started += 1;
                    log::debug!("worker started ({} outstanding)", outstanding);
                }
                ResultMessage::WorkerStop => {
                    if outstanding == 0 {
                        report.protocol_violations += 1;
                        log::warn!(
                            "{}",
                            ScanError::ProtocolViolation(
                                "worker stop received with no worker outstanding".to_string()
                            )
                        );
                        continue;
                    }
                    outstanding -= 1;
                    report.workers_stopped += 1;
                    log::debug!("worker stopped ({} outstanding)", outstanding);
                    if outstanding == 0 {
                        break;
                    }
                }
                ResultMessage::Match(job) => report.matches.push(job),
            }
        }

        Ok(report)
    }
}

/// In-process worker handle over the distributor's channels
#[derive(Debug, Clone)]
pub struct LocalWorkerChannels {
    work_sender: Sender<WorkMessage>,
    work_receiver: Receiver<WorkMessage>,
    result_sender: Sender<ResultMessage>,
}

impl LocalWorkerChannels {
    /// Forward a result message produced elsewhere (a remote follower)
    pub(crate) fn send_result(&self, message: ResultMessage) -> Result<()> {
        self.result_sender
            .send(message)
            .map_err(|_| ScanError::ChannelClosed)
    }

    /// Return a pulled message to the work queue when it could not be delivered
    pub(crate) fn requeue(&self, message: WorkMessage) -> Result<()> {
        self.work_sender
            .send(message)
            .map_err(|_| ScanError::ChannelClosed)
    }
}

impl WorkerChannels for LocalWorkerChannels {
    fn pull_next(&mut self) -> Result<WorkMessage> {
        self.work_receiver
            .recv()
            .map_err(|_| ScanError::ChannelClosed)
    }

    fn relay_end_of_work(&mut self) -> Result<()> {
        self.requeue(WorkMessage::EndOfWork)
    }

    fn report_start(&mut self) -> Result<()> {
        self.send_result(ResultMessage::WorkerStart)
    }

    fn report_match(&mut self, job: Job) -> Result<()> {
        self.send_result(ResultMessage::Match(job))
    }

    fn report_stop(&mut self) -> Result<()> {
        self.send_result(ResultMessage::WorkerStop)
    }
}
