//! Crash Triage debug backend adapter.
//!
//! This crate is the single seam between the triage service and the
//! process-introspection mechanism:
//! - [`DebugBackend`]: capability trait (create target, attach, state,
//!   threads, frames, resume, detach)
//! - [`AttachGuard`]: scoped attach that is guaranteed to detach on
//!   every exit path
//! - [`ptrace::PtraceBackend`]: real adapter over ptrace + /proc
//! - `mock::MockBackend`: in-memory test double (feature `test-utils`)
//!
//! An attach that is never released leaves the victim process suspended
//! forever, so detach is modeled as a scoped resource, not a manually
//! paired call.

pub mod procfs;
pub mod ptrace;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use ct_common::{FrameSnapshot, ProcessState, ThreadSnapshot, MAX_FRAMES, MAX_THREADS};

use ct_common::Result;

/// Opaque handle for a prepared (not yet attached) debug target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetHandle {
    id: u64,
}

impl TargetHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Handle for a process the backend is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    /// Pid of the attached target.
    pub pid: u32,
    target: u64,
}

impl ProcessHandle {
    pub fn new(target: &TargetHandle, pid: u32) -> Self {
        Self {
            pid,
            target: target.id,
        }
    }
}

/// Handle for one thread of an attached process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    /// Kernel thread id.
    pub tid: u32,
    /// Thread name, when resolvable.
    pub name: Option<String>,
}

/// Capability contract for a debugging technology.
///
/// Object-safe so the session handler can be driven by either the real
/// ptrace adapter or an in-memory double. Thread and frame sequences
/// are lazy, finite and not restartable; implementations should yield
/// at most [`MAX_THREADS`] / [`MAX_FRAMES`] items, and consumers bound
/// the walk again so a misbehaving adapter still cannot produce an
/// unbounded report.
pub trait DebugBackend: Send + Sync {
    /// Prepare a target slot for a future attach.
    fn create_target(&self) -> Result<TargetHandle>;

    /// Attach to `pid`, suspending it. On success the caller owns the
    /// attach and must detach exactly once; use [`AttachGuard`].
    fn attach(&self, target: &TargetHandle, pid: u32) -> Result<ProcessHandle>;

    /// Current state of the attached target.
    fn state(&self, process: &ProcessHandle) -> ProcessState;

    /// Live threads of the target.
    fn threads<'a>(
        &'a self,
        process: &ProcessHandle,
    ) -> Box<dyn Iterator<Item = ThreadHandle> + 'a>;

    /// Stack frames of one thread, innermost first.
    fn frames<'a>(
        &'a self,
        process: &ProcessHandle,
        thread: &ThreadHandle,
    ) -> Box<dyn Iterator<Item = FrameSnapshot> + 'a>;

    /// Let the target run again without detaching.
    fn resume(&self, process: &ProcessHandle) -> Result<()>;

    /// Release the attach. Must be called exactly once per successful
    /// [`DebugBackend::attach`], on every code path.
    fn detach(&self, process: &ProcessHandle) -> Result<()>;
}

/// Scoped attach: detaches on drop unless explicitly detached first.
///
/// The explicit [`AttachGuard::detach`] consumes the guard and surfaces
/// the backend error; `Drop` is the backstop for early-error paths and
/// logs instead.
pub struct AttachGuard<'a> {
    backend: &'a dyn DebugBackend,
    process: ProcessHandle,
    detached: bool,
}

impl<'a> AttachGuard<'a> {
    /// Attach to `pid` and wrap the result in a guard.
    pub fn attach(
        backend: &'a dyn DebugBackend,
        target: &TargetHandle,
        pid: u32,
    ) -> Result<Self> {
        let process = backend.attach(target, pid)?;
        Ok(Self {
            backend,
            process,
            detached: false,
        })
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    pub fn state(&self) -> ProcessState {
        self.backend.state(&self.process)
    }

    pub fn threads(&self) -> Box<dyn Iterator<Item = ThreadHandle> + '_> {
        self.backend.threads(&self.process)
    }

    pub fn frames(&self, thread: &ThreadHandle) -> Box<dyn Iterator<Item = FrameSnapshot> + '_> {
        self.backend.frames(&self.process, thread)
    }

    /// Resume the target while staying attached. Used on the
    /// not-stopped path so a victim is never left suspended.
    pub fn resume(&self) -> Result<()> {
        self.backend.resume(&self.process)
    }

    /// Detach explicitly, surfacing any backend error.
    pub fn detach(mut self) -> Result<()> {
        self.detached = true;
        self.backend.detach(&self.process)
    }
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        if !self.detached {
            if let Err(err) = self.backend.detach(&self.process) {
                tracing::warn!(pid = self.process.pid, error = %err, "detach on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for AttachGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachGuard")
            .field("pid", &self.process.pid)
            .field("detached", &self.detached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    #[test]
    fn test_guard_detaches_on_drop() {
        let backend = MockBackend::new().with_state(ProcessState::Stopped);
        let target = backend.create_target().unwrap();
        {
            let _guard = AttachGuard::attach(&backend, &target, 1234).unwrap();
        }
        assert_eq!(backend.attach_count(), 1);
        assert_eq!(backend.detach_count(), 1);
    }

    #[test]
    fn test_guard_explicit_detach_is_not_doubled() {
        let backend = MockBackend::new().with_state(ProcessState::Stopped);
        let target = backend.create_target().unwrap();
        let guard = AttachGuard::attach(&backend, &target, 1234).unwrap();
        guard.detach().unwrap();
        assert_eq!(backend.detach_count(), 1);
    }

    #[test]
    fn test_failed_attach_creates_no_guard() {
        let backend = MockBackend::new().fail_attach();
        let target = backend.create_target().unwrap();
        assert!(AttachGuard::attach(&backend, &target, 1234).is_err());
        assert_eq!(backend.attach_count(), 0);
        assert_eq!(backend.detach_count(), 0);
    }

    #[test]
    fn test_guard_resume_passthrough() {
        let backend = MockBackend::new().with_state(ProcessState::Running);
        let target = backend.create_target().unwrap();
        let guard = AttachGuard::attach(&backend, &target, 55).unwrap();
        guard.resume().unwrap();
        drop(guard);
        assert_eq!(backend.resume_count(), 1);
        assert_eq!(backend.detach_count(), 1);
    }
}
