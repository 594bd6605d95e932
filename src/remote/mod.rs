//! Distributed mode: followers on other hosts pull from the leader's queues
//!
//! - `protocol`: newline-delimited JSON frames
//! - `auth`: shared-secret challenge/response
//! - `server`: the leader's listener and per-follower proxies
//! - `client`: [`RemoteWorkerChannels`] used by a follower's worker loop

mod auth;
mod client;
mod protocol;
mod server;

pub use client::RemoteWorkerChannels;
pub use protocol::{FrameStream, Handshake, Reply, Request, MAX_FRAME_BYTES};
pub use server::LeaderServer;
