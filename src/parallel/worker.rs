//! Worker loop for the job protocol
//!
//! Pulls jobs, applies the matcher and forwards matches until it sees the
//! end-of-work sentinel.

use std::sync::Arc;

use crate::error::{Result, ScanError};
use crate::matcher::Matcher;

use super::types::{WorkMessage, WorkerChannels, WorkerSummary};

pub struct WorkerLoop<C: WorkerChannels> {
    id: usize,
    channels: C,
    matcher: Arc<dyn Matcher>,
}

impl<C: WorkerChannels> WorkerLoop<C> {
    pub fn new(id: usize, channels: C, matcher: Arc<dyn Matcher>) -> Self {
        Self {
            id,
            channels,
            matcher,
        }
    }

    /// Run until end of work.
    ///
    /// A matcher error aborts the worker without reporting stop, which
    /// leaves the leader waiting. Matching is deterministic, so retrying
    /// would fail the same way.
    pub fn run(mut self) -> Result<WorkerSummary> {
        self.channels.report_start()?;
        log::debug!("worker {} started", self.id);

        let mut summary = WorkerSummary::default();
        loop {
            match self.channels.pull_next()? {
                WorkMessage::EndOfWork => {
                    self.channels.relay_end_of_work()?;
                    self.channels.report_stop()?;
                    log::debug!(
                        "worker {} finished: {} processed, {} matched",
                        self.id,
                        summary.processed,
                        summary.matched
                    );
                    return Ok(summary);
                }
                WorkMessage::Job(job) => {
                    log::trace!("worker {} processing {}", self.id, job.record.commit);
                    summary.processed += 1;

                    let relevant = self.matcher.matches(&job.record).map_err(|e| match e {
                        ScanError::MatcherFailure { .. } => e,
                        other => ScanError::MatcherFailure {
                            commit: job.record.commit.clone(),
                            reason: other.to_string(),
                        },
                    })?;

                    if relevant {
                        summary.matched += 1;
                        self.channels.report_match(job)?;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitRecord;
    use crate::parallel::types::{Job, ResultMessage};
    use crate::parallel::JobDistributor;

    fn record(hash: &str, message: &str) -> Arc<CommitRecord> {
        let mut record = CommitRecord::new(hash);
        record.message = Some(message.to_string());
        Arc::new(record)
    }

    fn message_contains_fix() -> Arc<dyn Matcher> {
        Arc::new(|record: &CommitRecord| -> Result<bool> {
            Ok(record.message.as_deref().is_some_and(|m| m.contains("fix")))
        })
    }

    /// Records every call so tests can inspect the exact protocol sequence
    #[derive(Default)]
    struct ScriptedChannels {
        inbox: Vec<WorkMessage>,
        relayed: usize,
        results: Vec<ResultMessage>,
    }

    impl WorkerChannels for ScriptedChannels {
        fn pull_next(&mut self) -> Result<WorkMessage> {
            if self.inbox.is_empty() {
                return Err(ScanError::ChannelClosed);
            }
            Ok(self.inbox.remove(0))
        }

        fn relay_end_of_work(&mut self) -> Result<()> {
            self.relayed += 1;
            Ok(())
        }

        fn report_start(&mut self) -> Result<()> {
            self.results.push(ResultMessage::WorkerStart);
            Ok(())
        }

        fn report_match(&mut self, job: Job) -> Result<()> {
            self.results.push(ResultMessage::Match(job));
            Ok(())
        }

        fn report_stop(&mut self) -> Result<()> {
            self.results.push(ResultMessage::WorkerStop);
            Ok(())
        }
    }

    #[test]
    fn test_worker_protocol_sequence() {
        let fixed = record("a", "fix leak");
        let mut channels = ScriptedChannels::default();
        channels.inbox = vec![
            WorkMessage::Job(Job { seq: 0, record: Arc::clone(&fixed) }),
            WorkMessage::Job(Job { seq: 1, record: record("b", "docs") }),
            WorkMessage::EndOfWork,
        ];

        let summary = WorkerLoop::new(0, &mut channels, message_contains_fix())
            .run()
            .unwrap();

        assert_eq!(summary, WorkerSummary { processed: 2, matched: 1 });
        assert_eq!(channels.relayed, 1);
        assert_eq!(
            channels.results,
            vec![
                ResultMessage::WorkerStart,
                ResultMessage::Match(Job { seq: 0, record: fixed }),
                ResultMessage::WorkerStop,
            ]
        );
    }

    #[test]
    fn test_matcher_failure_aborts_without_stop() {
        let mut channels = ScriptedChannels::default();
        channels.inbox = vec![
            WorkMessage::Job(Job { seq: 0, record: record("bad", "x") }),
            WorkMessage::EndOfWork,
        ];
        let failing: Arc<dyn Matcher> =
            Arc::new(|_: &CommitRecord| -> Result<bool> { Err(ScanError::ChannelClosed) });

        let err = WorkerLoop::new(7, &mut channels, failing).run().unwrap_err();
        match err {
            ScanError::MatcherFailure { commit, .. } => assert_eq!(commit, "bad"),
            other => panic!("expected MatcherFailure, got {:?}", other),
        }
        assert_eq!(channels.relayed, 0);
        assert_eq!(channels.results, vec![ResultMessage::WorkerStart]);
    }

    #[test]
    fn test_worker_over_local_channels() {
        let distributor = JobDistributor::new();
        let recs = vec![record("a", "fix one"), record("b", "other"), record("c", "fix two")];
        distributor.submit_all(recs).unwrap();

        let worker = WorkerLoop::new(0, distributor.worker_channels(), message_contains_fix());
        let summary = worker.run().unwrap();
        assert_eq!(summary, WorkerSummary { processed: 3, matched: 2 });

        let report = distributor.drain_results().unwrap();
        let seqs: Vec<usize> = report.matches.iter().map(|j| j.seq).collect();
        assert_eq!(seqs, vec![0, 2]);

        // The sentinel is still queued for any later worker
        let mut late = distributor.worker_channels();
        assert_eq!(late.pull_next().unwrap(), WorkMessage::EndOfWork);
    }
}
