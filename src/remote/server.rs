//! Leader-side TCP server exposing the job queues to followers

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::parallel::{JobDistributor, LocalWorkerChannels, WorkerChannels};

use super::auth;
use super::protocol::{FrameStream, Reply, Request};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts follower connections until shut down.
///
/// Each authenticated connection is served by its own thread acting as a
/// proxy for one [`LocalWorkerChannels`] handle.
pub struct LeaderServer {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LeaderServer {
    pub fn start<A: ToSocketAddrs>(
        addr: A,
        secret: Vec<u8>,
        distributor: &JobDistributor,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        log::info!("leader listening on {}", local_addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let channels = distributor.worker_channels();
        let secret: Arc<[u8]> = secret.into();

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("scan-leader-accept".to_string())
                .spawn(move || accept_loop(listener, secret, channels, shutdown))?
        };

        Ok(Self {
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new followers. Connections already being served are
    /// left to finish on their own.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LeaderServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    secret: Arc<[u8]>,
    channels: LocalWorkerChannels,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let secret = Arc::clone(&secret);
                let channels = channels.clone();
                let spawned = thread::Builder::new()
                    .name(format!("scan-follower-{}", peer))
                    .spawn(move || {
                        if let Err(e) = serve_follower(stream, peer, &secret, channels) {
                            log::warn!("follower {}: {}", peer, e);
                        }
                    });
                if let Err(e) = spawned {
                    log::error!("could not spawn handler for {}: {}", peer, e);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(e) => {
                log::warn!("accept failed: {}", e);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    log::debug!("leader stopped accepting followers");
}

fn serve_follower(
    stream: TcpStream,
    peer: SocketAddr,
    secret: &[u8],
    mut channels: LocalWorkerChannels,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

    let mut frames = FrameStream::from_tcp(stream)?;
    auth::accept(&mut frames, secret)?;
    frames.tcp_stream().set_read_timeout(None)?;
    log::info!("follower {} authenticated", peer);

    while let Some(request) = frames.recv::<Request>()? {
        let reply = match handle_request(&mut channels, request) {
            Ok(reply) => reply,
            Err(e) => {
                let _ = frames.send(&Reply::Error {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        if let Err(e) = frames.send(&reply) {
            if let Reply::Work { message } = reply {
                // Undelivered work goes back so another worker can take it
                log::warn!("follower {} dropped during pull, requeueing", peer);
                channels.requeue(message)?;
            }
            return Err(e);
        }
    }

    log::debug!("follower {} disconnected", peer);
    Ok(())
}

fn handle_request(channels: &mut LocalWorkerChannels, request: Request) -> Result<Reply> {
    match request {
        Request::Pull => Ok(Reply::Work {
            message: channels.pull_next()?,
        }),
        Request::RelayEndOfWork => {
            channels.relay_end_of_work()?;
            Ok(Reply::Ack)
        }
        Request::Report { message } => {
            channels.send_result(message)?;
            Ok(Reply::Ack)
        }
    }
}
