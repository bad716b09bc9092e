//! Kernel-verified peer authentication.
//!
//! A connecting reporter claims a pid on the wire, but the only
//! authority on who is actually on the other end of the socket is the
//! kernel's SO_PEERCRED answer. Credentials are queried once per
//! connection, at accept time and before any bytes are read, so a
//! peer cannot substitute itself mid-handshake.

use ct_common::{Error, Result};
use nix::sys::socket::{getsockopt, sockopt};
use std::os::unix::net::UnixStream;

/// Kernel-supplied identity of the socket peer. Immutable and
/// authoritative over any value sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredential {
    pub pid: u32,
    pub uid: u32,
    pub gid: u32,
}

/// Query the peer credentials of an accepted connection.
///
/// Fails closed: on error the caller drops the connection without
/// dispatching a session.
pub fn authenticate(stream: &UnixStream) -> Result<PeerCredential> {
    let creds = getsockopt(stream, sockopt::PeerCredentials)
        .map_err(|errno| Error::CredentialQuery(errno.to_string()))?;
    Ok(PeerCredential {
        pid: creds.pid() as u32,
        uid: creds.uid(),
        gid: creds.gid(),
    })
}
