//! Parallel classification for scanchanges
//!
//! This module fans commit records out to a pool of workers and collects
//! the relevant ones back.
//!
//! # Module Structure
//!
//! - `types`: Messages, reports and the worker-side channel trait
//! - `distributor`: The shared work and result queues
//! - `worker`: The per-worker pull/match/forward loop
//! - `coordinator`: Leader orchestration and the local thread pool

mod coordinator;
mod distributor;
mod types;
mod worker;

pub use coordinator::{
    join_workers, scan_local, spawn_workers, Coordinator, ScanOutcome, WorkerHandle,
};
pub use distributor::{JobDistributor, LocalWorkerChannels};
pub use types::{
    DrainReport, Job, ParallelConfig, ResultMessage, WorkMessage, WorkerChannels, WorkerSummary,
};
pub use worker::WorkerLoop;
