//! Shared-secret authentication for leader/follower connections
//!
//! Both sides prove knowledge of the secret by returning
//! HMAC-SHA256(secret, role || nonce) for a nonce chosen by the other side.
//! The role label keeps one side's answer from being replayed as the other's.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::io::{BufRead, Write};

use crate::error::{Result, ScanError};

use super::protocol::{FrameStream, Handshake};

type HmacSha256 = Hmac<Sha256>;

pub const NONCE_LEN: usize = 32;

const LEADER_ROLE: &[u8] = b"scanchanges-leader";
const FOLLOWER_ROLE: &[u8] = b"scanchanges-follower";

pub fn new_nonce() -> String {
    let bytes: Vec<u8> = (0..NONCE_LEN).map(|_| fastrand::u8(..)).collect();
    hex::encode(bytes)
}

fn mac(secret: &[u8], role: &[u8], nonce: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ScanError::Authentication(format!("HMAC init error: {}", e)))?;
    mac.update(role);
    mac.update(nonce.as_bytes());
    Ok(mac)
}

pub fn sign(secret: &[u8], role: &[u8], nonce: &str) -> Result<String> {
    Ok(hex::encode(mac(secret, role, nonce)?.finalize().into_bytes()))
}

/// Constant-time check of a hex digest
pub fn verify(secret: &[u8], role: &[u8], nonce: &str, digest: &str) -> bool {
    let Ok(expected) = hex::decode(digest) else {
        return false;
    };
    mac(secret, role, nonce)
        .map(|mac| mac.verify_slice(&expected).is_ok())
        .unwrap_or(false)
}

fn check_nonce(nonce: &str) -> Result<()> {
    match hex::decode(nonce) {
        Ok(bytes) if bytes.len() == NONCE_LEN => Ok(()),
        _ => Err(ScanError::Authentication("malformed nonce".to_string())),
    }
}

/// Leader side of the handshake
pub fn accept<R: BufRead, W: Write>(frames: &mut FrameStream<R, W>, secret: &[u8]) -> Result<()> {
    let challenge = new_nonce();
    frames.send(&Handshake::Challenge {
        nonce: challenge.clone(),
    })?;

    let (digest, follower_nonce) = match frames.require::<Handshake>()? {
        Handshake::Hello { digest, nonce } => (digest, nonce),
        other => {
            return Err(ScanError::Authentication(format!(
                "expected hello, got {:?}",
                other
            )))
        }
    };

    if !verify(secret, FOLLOWER_ROLE, &challenge, &digest) || check_nonce(&follower_nonce).is_err()
    {
        // Best effort: the follower may already be gone
        let _ = frames.send(&Handshake::Rejected {
            reason: "authentication failed".to_string(),
        });
        return Err(ScanError::Authentication(
            "follower did not prove the shared secret".to_string(),
        ));
    }

    frames.send(&Handshake::Welcome {
        digest: sign(secret, LEADER_ROLE, &follower_nonce)?,
    })
}

/// Follower side of the handshake
pub fn connect<R: BufRead, W: Write>(frames: &mut FrameStream<R, W>, secret: &[u8]) -> Result<()> {
    let challenge = match frames.require::<Handshake>()? {
        Handshake::Challenge { nonce } => nonce,
        other => {
            return Err(ScanError::Authentication(format!(
                "expected challenge, got {:?}",
                other
            )))
        }
    };
    check_nonce(&challenge)?;

    let own_nonce = new_nonce();
    frames.send(&Handshake::Hello {
        digest: sign(secret, FOLLOWER_ROLE, &challenge)?,
        nonce: own_nonce.clone(),
    })?;

    match frames.require::<Handshake>()? {
        Handshake::Welcome { digest } if verify(secret, LEADER_ROLE, &own_nonce, &digest) => Ok(()),
        Handshake::Welcome { .. } => Err(ScanError::Authentication(
            "leader did not prove the shared secret".to_string(),
        )),
        Handshake::Rejected { reason } => Err(ScanError::Authentication(format!(
            "leader rejected connection: {}",
            reason
        ))),
        other => Err(ScanError::Authentication(format!(
            "expected welcome, got {:?}",
            other
        ))),
    }
}
