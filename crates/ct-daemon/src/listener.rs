//! Unix socket listener and connection dispatch.
//!
//! The server owns the listening socket for the lifetime of the
//! process: it removes a stale socket file left by a previous run,
//! binds with an explicit backlog, then accepts forever. Each accepted
//! connection is authenticated via its kernel peer credential and
//! handed to a session thread; a faulty session never takes the
//! listener down.

use crate::auth;
use crate::session;
use ct_backend::DebugBackend;
use ct_common::Result;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Accept backlog for the listening socket.
const LISTEN_BACKLOG: i32 = 100;

/// Long-lived triage server bound to a Unix socket.
pub struct TriageServer {
    listener: UnixListener,
    socket_path: PathBuf,
    report_dir: PathBuf,
    backend: Arc<dyn DebugBackend>,
    shutdown: Arc<AtomicBool>,
}

/// Handle for stopping a running [`TriageServer`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    socket_path: PathBuf,
    shutdown: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Request shutdown and wake the blocked accept call.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // accept() blocks until a connection arrives; poke it.
        let _ = UnixStream::connect(&self.socket_path);
    }
}

impl TriageServer {
    /// Bind the socket and prepare to serve.
    ///
    /// A socket file left behind by a crashed previous run is removed
    /// before binding; a live socket held by another process is not
    /// distinguished from a stale one, matching single-instance
    /// deployment.
    pub fn bind(
        socket_path: &Path,
        report_dir: &Path,
        backend: Arc<dyn DebugBackend>,
    ) -> Result<Self> {
        match std::fs::remove_file(socket_path) {
            Ok(()) => debug!(socket = %socket_path.display(), "removed stale socket"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let listener = bind_with_backlog(socket_path)?;
        info!(
            socket = %socket_path.display(),
            report_dir = %report_dir.display(),
            "listening"
        );
        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            report_dir: report_dir.to_path_buf(),
            backend,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            socket_path: self.socket_path.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Accept connections until shutdown is requested.
    ///
    /// Accept errors are logged and the loop continues; only shutdown
    /// ends it.
    pub fn serve(&self) -> Result<()> {
        for connection in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            let stream = match connection {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };
            self.dispatch(stream);
        }
        info!("listener stopped");
        Ok(())
    }

    /// Authenticate the connection and hand it to a session thread.
    fn dispatch(&self, mut stream: UnixStream) {
        let peer = match auth::authenticate(&stream) {
            Ok(peer) => peer,
            Err(err) => {
                warn!(code = err.code(), error = %err, "peer credential query failed");
                return;
            }
        };
        debug!(peer_pid = peer.pid, peer_uid = peer.uid, "connection accepted");

        let backend = Arc::clone(&self.backend);
        let report_dir = self.report_dir.clone();
        let spawned = thread::Builder::new()
            .name(format!("session-{}", peer.pid))
            .spawn(move || {
                session::handle_session(&mut stream, peer.pid, backend.as_ref(), &report_dir);
            });
        if let Err(err) = spawned {
            warn!(peer_pid = peer.pid, error = %err, "failed to spawn session thread");
        }
    }
}

impl Drop for TriageServer {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.socket_path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(socket = %self.socket_path.display(), error = %err, "socket cleanup failed");
            }
        }
    }
}

/// Bind a Unix stream socket with an explicit accept backlog.
///
/// `std::os::unix::net::UnixListener::bind` hardcodes its backlog, so
/// the socket is built through the raw calls and then handed to std.
fn bind_with_backlog(path: &Path) -> Result<UnixListener> {
    use nix::sys::socket::{
        bind, listen, socket, AddressFamily, Backlog, SockFlag, SockType, UnixAddr,
    };

    let fd = socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_CLOEXEC,
        None,
    )
    .map_err(io::Error::from)?;
    let addr = UnixAddr::new(path).map_err(io::Error::from)?;
    bind(fd.as_raw_fd(), &addr).map_err(io::Error::from)?;
    let backlog = Backlog::new(LISTEN_BACKLOG).map_err(io::Error::from)?;
    listen(&fd, backlog).map_err(io::Error::from)?;
    Ok(UnixListener::from(OwnedFd::from(fd)))
}
