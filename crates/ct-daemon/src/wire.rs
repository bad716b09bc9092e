//! Wire protocol for crash notifications.
//!
//! Per session, over a local stream socket:
//! - client → server: 4 bytes little-endian pid, then 1 trigger byte
//!   (value ignored, presence is the trigger)
//! - server → client: exactly one `0x00` on success; zero bytes then
//!   close on any failure
//!
//! Short reads are reported with the byte counts so the session
//! boundary can log them; the peer learns nothing.

use ct_common::{Error, Result};
use std::io::{self, Read};

/// Length of the claimed-pid field.
pub const PID_FIELD_LEN: usize = 4;

/// Length of a full notification (pid + trigger).
pub const NOTIFICATION_LEN: usize = PID_FIELD_LEN + 1;

/// The single acknowledgement byte sent after a persisted report.
pub const ACK_BYTE: u8 = 0x00;

/// A crash notification as sent by the reporter.
///
/// Ephemeral: exists only during one session's read phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashNotification {
    /// Pid the reporter claims to be. Authoritative only once matched
    /// against the socket peer credential.
    pub claimed_pid: u32,
    /// Trigger byte; any value triggers analysis.
    pub trigger: u8,
}

/// Parse a full notification from a byte buffer.
pub fn parse_notification(buf: &[u8]) -> Result<CrashNotification> {
    if buf.len() < NOTIFICATION_LEN {
        return Err(Error::ShortRead {
            wanted: NOTIFICATION_LEN,
            got: buf.len(),
        });
    }
    let pid_bytes: [u8; PID_FIELD_LEN] = buf[..PID_FIELD_LEN]
        .try_into()
        .expect("slice length checked above");
    Ok(CrashNotification {
        claimed_pid: u32::from_le_bytes(pid_bytes),
        trigger: buf[PID_FIELD_LEN],
    })
}

/// Read the 4-byte little-endian claimed pid.
pub fn read_claimed_pid<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; PID_FIELD_LEN];
    read_full(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read the 1-byte trigger.
pub fn read_trigger<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_full(reader, &mut buf)?;
    Ok(buf[0])
}

/// Fill `buf` completely or fail with the exact byte counts.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => {
                return Err(Error::ShortRead {
                    wanted: buf.len(),
                    got,
                })
            }
            Ok(n) => got += n,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::Io(err)),
        }
    }
    Ok(())
}
