//! Wire format between leader and followers
//!
//! Every frame is one JSON document terminated by a newline.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;

use crate::error::{Result, ScanError};
use crate::parallel::{ResultMessage, WorkMessage};

/// Upper bound on a single frame, commit messages included
pub const MAX_FRAME_BYTES: u64 = 64 * 1024 * 1024;

/// Mutual authentication frames exchanged before any request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Handshake {
    /// Leader to follower: prove you know the secret
    Challenge { nonce: String },
    /// Follower to leader: answer plus a challenge of its own
    Hello { digest: String, nonce: String },
    /// Leader to follower: accepted, with the leader's answer
    Welcome { digest: String },
    Rejected { reason: String },
}

/// Follower requests, one reply each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Pull,
    RelayEndOfWork,
    Report { message: ResultMessage },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Work { message: WorkMessage },
    Ack,
    Error { reason: String },
}

/// Newline-delimited JSON framing over a reader/writer pair
pub struct FrameStream<R, W> {
    reader: R,
    writer: W,
}

impl FrameStream<BufReader<TcpStream>, BufWriter<TcpStream>> {
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self::new(reader, BufWriter::new(stream)))
    }

    pub fn tcp_stream(&self) -> &TcpStream {
        self.reader.get_ref()
    }
}

impl<R: BufRead, W: Write> FrameStream<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn send<T: Serialize>(&mut self, frame: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Next frame, or `None` when the peer closed the connection cleanly
    pub fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let mut line = String::new();
        let read = (&mut self.reader)
            .take(MAX_FRAME_BYTES)
            .read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        if !line.ends_with('\n') {
            if read as u64 >= MAX_FRAME_BYTES {
                return Err(ScanError::Transport(format!(
                    "frame exceeds {} bytes",
                    MAX_FRAME_BYTES
                )));
            }
            return Err(ScanError::Transport(
                "connection closed in the middle of a frame".to_string(),
            ));
        }
        Ok(Some(serde_json::from_str(line.trim_end())?))
    }

    /// Like [`recv`](Self::recv) but treats a closed connection as an error
    pub fn require<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.recv()?
            .ok_or_else(|| ScanError::Transport("connection closed by peer".to_string()))
    }
}
