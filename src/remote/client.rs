//! Follower-side handle on a leader's job queues

use std::io::{self, BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{Result, ScanError};
use crate::parallel::{Job, ResultMessage, WorkMessage, WorkerChannels};

use super::auth;
use super::protocol::{FrameStream, Reply, Request};

/// [`WorkerChannels`] implemented by request/reply calls to a leader
pub struct RemoteWorkerChannels {
    frames: FrameStream<BufReader<TcpStream>, BufWriter<TcpStream>>,
}

impl RemoteWorkerChannels {
    /// Connect and authenticate with the shared secret
    pub fn connect<A: ToSocketAddrs>(addr: A, secret: &[u8]) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| ScanError::Transport(format!("could not reach leader: {}", e)))?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;

        let mut frames = FrameStream::from_tcp(stream)?;
        auth::connect(&mut frames, secret)?;
        log::info!("connected to leader {}", peer);

        Ok(Self { frames })
    }

    fn call(&mut self, request: &Request) -> Result<Reply> {
        self.frames.send(request)?;
        match self.frames.require::<Reply>()? {
            Reply::Error { reason } => Err(ScanError::Transport(format!(
                "leader failed {:?}: {}",
                request, reason
            ))),
            reply => Ok(reply),
        }
    }

    fn acknowledged(&mut self, request: Request) -> Result<()> {
        match self.call(&request)? {
            Reply::Ack => Ok(()),
            other => Err(ScanError::ProtocolViolation(format!(
                "expected ack for {:?}, got {:?}",
                request, other
            ))),
        }
    }

    fn report(&mut self, message: ResultMessage) -> Result<()> {
        self.acknowledged(Request::Report { message })
    }
}

impl WorkerChannels for RemoteWorkerChannels {
    fn pull_next(&mut self) -> Result<WorkMessage> {
        match self.call(&Request::Pull)? {
            Reply::Work { message } => Ok(message),
            other => Err(ScanError::ProtocolViolation(format!(
                "expected work, got {:?}",
                other
            ))),
        }
    }

    fn relay_end_of_work(&mut self) -> Result<()> {
        self.acknowledged(Request::RelayEndOfWork)
    }

    fn report_start(&mut self) -> Result<()> {
        self.report(ResultMessage::WorkerStart)
    }

    fn report_match(&mut self, job: Job) -> Result<()> {
        self.report(ResultMessage::Match(job))
    }

    /// The leader may finish and hang up as soon as it has read the last
    /// stop, so a closed connection in place of the ack still counts.
    fn report_stop(&mut self) -> Result<()> {
        let request = Request::Report {
            message: ResultMessage::WorkerStop,
        };
        self.frames.send(&request)?;
        match self.frames.recv::<Reply>() {
            Ok(Some(Reply::Ack)) => Ok(()),
            Ok(None) => {
                log::debug!("leader closed the connection after our stop");
                Ok(())
            }
            Err(ScanError::Io(err))
                if matches!(
                    err.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
                ) =>
            {
                log::debug!("leader dropped the connection after our stop: {}", err);
                Ok(())
            }
            Ok(Some(Reply::Error { reason })) => Err(ScanError::Transport(format!(
                "leader failed {:?}: {}",
                request, reason
            ))),
            Ok(Some(other)) => Err(ScanError::ProtocolViolation(format!(
                "expected ack for {:?}, got {:?}",
                request, other
            ))),
            Err(err) => Err(err),
        }
    }
}
