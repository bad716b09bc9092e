//! Per-connection crash triage session.
//!
//! One session is the full lifecycle of one accepted connection:
//! read the notification, check the claimed pid against the kernel
//! peer credential, attach the debug backend, walk threads and frames
//! into the report file, detach, acknowledge. Every failure is mapped
//! at the session boundary to "log, close without acknowledgement" —
//! the reporter learns nothing it cannot already observe, and nothing
//! propagates to the listener.
//!
//! The protocol function is generic over `Read + Write` so tests can
//! drive it with a socketpair and a mock backend.

use crate::wire;
use ct_backend::{AttachGuard, DebugBackend};
use ct_common::{Error, ProcessState, Result, ThreadSnapshot, MAX_FRAMES, MAX_THREADS};
use ct_report::{ensure_report_dir, report_path, ReportWriter};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a completed (acknowledged) session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub pid: u32,
    pub exe_name: String,
    pub threads: usize,
    pub report_path: PathBuf,
}

/// Run the session protocol for one authenticated connection.
///
/// `peer_pid` is the kernel-verified pid from accept time. On success
/// the acknowledgement byte has been written after the report file was
/// flushed; on error the caller closes the connection without sending
/// anything.
pub fn run_session<S: Read + Write>(
    stream: &mut S,
    peer_pid: u32,
    backend: &dyn DebugBackend,
    report_dir: &Path,
) -> Result<SessionOutcome> {
    // Steps 1-2: claimed pid, checked against the kernel's answer
    // before anything else is read.
    let claimed_pid = wire::read_claimed_pid(stream)?;
    if claimed_pid != peer_pid {
        return Err(Error::PidMismatch {
            claimed: claimed_pid,
            peer: peer_pid,
        });
    }

    // Step 3: the trigger byte. Any value triggers analysis.
    let trigger = wire::read_trigger(stream)?;
    debug!(pid = claimed_pid, trigger, "crash notification received");

    // Steps 4-6: resolve the target identity and open the report file.
    // A repeat crash of the same pid overwrites the prior report.
    let exe_name = ct_backend::procfs::exe_basename(claimed_pid)?;
    ensure_report_dir(report_dir, &exe_name)?;
    let path = report_path(report_dir, &exe_name, claimed_pid);
    let file = File::create(&path)?;

    // Steps 7-10: attach, walk, detach. The guard detaches on every
    // exit path; an attach that is never released would leave the
    // victim suspended forever.
    let target = backend.create_target()?;
    let guard = AttachGuard::attach(backend, &target, claimed_pid)?;

    let state = guard.state();
    if state != ProcessState::Stopped {
        warn!(pid = claimed_pid, %state, "target not stopped, resuming without report");
        if let Err(err) = guard.resume() {
            warn!(pid = claimed_pid, error = %err, "resume failed");
        }
        if let Err(err) = guard.detach() {
            warn!(pid = claimed_pid, error = %err, "detach failed");
        }
        return Err(Error::NotStopped {
            pid: claimed_pid,
            state,
        });
    }

    let mut writer = ReportWriter::new(BufWriter::new(file));
    writer.write_preamble(&exe_name, claimed_pid)?;
    for handle in guard.threads().take(MAX_THREADS) {
        let mut thread = ThreadSnapshot::new(handle.tid);
        thread.name = handle.name.clone();
        thread.frames = guard.frames(&handle).take(MAX_FRAMES).collect();
        writer.write_thread(&thread)?;
    }
    let threads = writer.thread_count();

    // The report must be durable on disk before the reporter is told
    // it may proceed (and typically terminate).
    let buffered = writer.finish()?;
    buffered.into_inner().map_err(|err| err.into_error())?;

    if let Err(err) = guard.detach() {
        // The report is complete; a failed release is logged, not
        // surfaced to the reporter.
        warn!(pid = claimed_pid, error = %err, "detach failed");
    }

    // Step 11: the acknowledgement, strictly after the report content.
    stream.write_all(&[wire::ACK_BYTE])?;
    stream.flush()?;

    let outcome = SessionOutcome {
        pid: claimed_pid,
        exe_name,
        threads,
        report_path: path,
    };
    info!(
        pid = outcome.pid,
        exe = %outcome.exe_name,
        threads = outcome.threads,
        report = %outcome.report_path.display(),
        "crash report written"
    );
    Ok(outcome)
}

/// Session boundary: run the protocol and map every error to a log
/// line. The connection closes when the stream drops in the caller.
pub fn handle_session<S: Read + Write>(
    stream: &mut S,
    peer_pid: u32,
    backend: &dyn DebugBackend,
    report_dir: &Path,
) {
    match run_session(stream, peer_pid, backend, report_dir) {
        Ok(_) => {}
        Err(err) if err.is_silent_drop() => {
            // The peer never learns why it was rejected.
            warn!(
                peer_pid,
                code = err.code(),
                category = %err.category(),
                error = %err,
                "session rejected"
            );
        }
        Err(err) => {
            warn!(
                peer_pid,
                code = err.code(),
                category = %err.category(),
                error = %err,
                "session failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_backend::mock::MockBackend;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// In-memory duplex stream: reads from a scripted input, collects
    /// writes for assertions.
    struct ScriptedStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn notification(pid: u32) -> Vec<u8> {
        let mut bytes = pid.to_le_bytes().to_vec();
        bytes.push(0x01);
        bytes
    }

    /// The only pid a session can fully triage in a test is our own:
    /// its /proc entries exist and its peer credential is ours.
    fn own_pid() -> u32 {
        std::process::id()
    }

    #[test]
    fn test_mismatch_sends_nothing_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let mut stream = ScriptedStream::new(notification(1234));

        let err = run_session(&mut stream, 9999, &backend, dir.path()).unwrap_err();
        assert_eq!(err.code(), 21);
        assert!(stream.output.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(backend.attach_count(), 0);
    }

    #[test]
    fn test_short_pid_read_aborts_silently() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let mut stream = ScriptedStream::new(vec![0x01, 0x02]);

        let err = run_session(&mut stream, own_pid(), &backend, dir.path()).unwrap_err();
        assert_eq!(err.code(), 30);
        assert!(stream.output.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_trigger_aborts_silently() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let mut stream = ScriptedStream::new(own_pid().to_le_bytes().to_vec());

        let err = run_session(&mut stream, own_pid(), &backend, dir.path()).unwrap_err();
        assert_eq!(err.code(), 30);
        assert!(stream.output.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stopped_target_produces_report_and_ack() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new()
            .with_state(ProcessState::Stopped)
            .with_thread(101, Some("main"), &["aaa", "bbb", "ccc"])
            .with_thread(102, None, &["ddd", "eee", "fff"]);
        let mut stream = ScriptedStream::new(notification(own_pid()));

        let outcome = run_session(&mut stream, own_pid(), &backend, dir.path()).unwrap();
        assert_eq!(stream.output, vec![wire::ACK_BYTE]);
        assert_eq!(outcome.threads, 2);

        let report = std::fs::read_to_string(&outcome.report_path).unwrap();
        assert_eq!(report.matches("thread #").count(), 2);
        assert_eq!(report.matches("  frame #").count(), 6);

        assert_eq!(backend.attach_count(), 1);
        assert_eq!(backend.detach_count(), 1);
        assert_eq!(backend.resume_count(), 0);
    }

    #[test]
    fn test_attach_failure_no_ack_detach_not_called() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new().fail_attach();
        let mut stream = ScriptedStream::new(notification(own_pid()));

        let err = run_session(&mut stream, own_pid(), &backend, dir.path()).unwrap_err();
        assert_eq!(err.code(), 41);
        assert!(stream.output.is_empty());
        assert_eq!(backend.attach_count(), 0);
        assert_eq!(backend.detach_count(), 0);

        // The report file was opened before the attach and stays empty.
        let exe = ct_backend::procfs::exe_basename(own_pid()).unwrap();
        let path = ct_report::report_path(dir.path(), &exe, own_pid());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_create_target_failure_no_ack() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new().fail_create_target();
        let mut stream = ScriptedStream::new(notification(own_pid()));

        let err = run_session(&mut stream, own_pid(), &backend, dir.path()).unwrap_err();
        assert_eq!(err.code(), 40);
        assert!(stream.output.is_empty());
    }

    #[test]
    fn test_running_target_resumed_once_no_ack() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new()
            .with_state(ProcessState::Running)
            .with_thread(101, None, &["never written"]);
        let mut stream = ScriptedStream::new(notification(own_pid()));

        let err = run_session(&mut stream, own_pid(), &backend, dir.path()).unwrap_err();
        assert_eq!(err.code(), 42);
        assert!(stream.output.is_empty());
        assert_eq!(backend.resume_count(), 1);
        assert_eq!(backend.detach_count(), 1);

        let exe = ct_backend::procfs::exe_basename(own_pid()).unwrap();
        let path = ct_report::report_path(dir.path(), &exe, own_pid());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_walk_is_bounded_at_100_by_100() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new()
            .with_state(ProcessState::Stopped)
            .with_uniform_threads(150, 120);
        let mut stream = ScriptedStream::new(notification(own_pid()));

        let outcome = run_session(&mut stream, own_pid(), &backend, dir.path()).unwrap();
        assert_eq!(outcome.threads, MAX_THREADS);

        let report = std::fs::read_to_string(&outcome.report_path).unwrap();
        assert_eq!(report.matches("thread #").count(), MAX_THREADS);
        assert_eq!(
            report.matches("  frame #").count(),
            MAX_THREADS * MAX_FRAMES
        );
    }

    #[test]
    fn test_repeat_crash_overwrites_report() {
        let dir = TempDir::new().unwrap();
        let big = MockBackend::new()
            .with_state(ProcessState::Stopped)
            .with_thread(1, None, &["one", "two", "three"]);
        let small = MockBackend::new()
            .with_state(ProcessState::Stopped)
            .with_thread(1, None, &["only"]);

        let mut stream = ScriptedStream::new(notification(own_pid()));
        let first = run_session(&mut stream, own_pid(), &big, dir.path()).unwrap();
        let first_len = std::fs::metadata(&first.report_path).unwrap().len();

        let mut stream = ScriptedStream::new(notification(own_pid()));
        let second = run_session(&mut stream, own_pid(), &small, dir.path()).unwrap();

        assert_eq!(first.report_path, second.report_path);
        let second_len = std::fs::metadata(&second.report_path).unwrap().len();
        assert!(second_len < first_len, "later report must fully replace the prior one");
    }

    #[test]
    fn test_handle_session_swallows_errors() {
        let dir = TempDir::new().unwrap();
        let backend = MockBackend::new().fail_attach();
        let mut stream = ScriptedStream::new(notification(own_pid()));
        // Must not panic or propagate.
        handle_session(&mut stream, own_pid(), &backend, dir.path());
        assert!(stream.output.is_empty());
    }
}
