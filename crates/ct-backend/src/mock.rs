//! Mock debug backend for testing.
//!
//! This module provides an in-memory [`DebugBackend`] so the session
//! protocol can be exercised without a real attach. It supports:
//!
//! - Builder pattern for scripting state and thread/frame fixtures
//! - Failure injection for create_target and attach
//! - Call counters for asserting the attach/resume/detach pairing
//!
//! # Example
//!
//! ```ignore
//! use ct_backend::mock::MockBackend;
//! use ct_backend::ProcessState;
//!
//! let backend = MockBackend::new()
//!     .with_state(ProcessState::Stopped)
//!     .with_thread(101, Some("main"), &["frame a", "frame b"])
//!     .with_thread(102, None, &["frame c"]);
//! ```

use crate::{DebugBackend, ProcessHandle, TargetHandle, ThreadHandle};
use ct_common::{Error, FrameSnapshot, ProcessState, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// One scripted thread fixture.
#[derive(Debug, Clone)]
struct MockThread {
    tid: u32,
    name: Option<String>,
    frames: Vec<String>,
}

/// In-memory debug backend double.
///
/// The fixture data is immutable after building; only the call
/// counters mutate, so the backend is freely shared across threads.
#[derive(Debug)]
pub struct MockBackend {
    state: ProcessState,
    threads: Vec<MockThread>,
    fail_create_target: bool,
    fail_attach: bool,
    next_target: AtomicU64,
    attach_calls: AtomicUsize,
    resume_calls: AtomicUsize,
    detach_calls: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            state: ProcessState::Stopped,
            threads: Vec::new(),
            fail_create_target: false,
            fail_attach: false,
            next_target: AtomicU64::new(0),
            attach_calls: AtomicUsize::new(0),
            resume_calls: AtomicUsize::new(0),
            detach_calls: AtomicUsize::new(0),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the state reported after attach.
    pub fn with_state(mut self, state: ProcessState) -> Self {
        self.state = state;
        self
    }

    /// Add one thread fixture with its frame texts.
    pub fn with_thread(mut self, tid: u32, name: Option<&str>, frames: &[&str]) -> Self {
        self.threads.push(MockThread {
            tid,
            name: name.map(str::to_string),
            frames: frames.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Add `threads` uniform threads of `frames` frames each. Used to
    /// over-report past the walk bounds.
    pub fn with_uniform_threads(mut self, threads: usize, frames: usize) -> Self {
        for i in 0..threads {
            self.threads.push(MockThread {
                tid: 1000 + i as u32,
                name: None,
                frames: (0..frames).map(|j| format!("frame {j}")).collect(),
            });
        }
        self
    }

    /// Make create_target fail.
    pub fn fail_create_target(mut self) -> Self {
        self.fail_create_target = true;
        self
    }

    /// Make attach fail.
    pub fn fail_attach(mut self) -> Self {
        self.fail_attach = true;
        self
    }

    /// Number of successful attaches.
    pub fn attach_count(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    /// Number of resume calls.
    pub fn resume_count(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }

    /// Number of detach calls.
    pub fn detach_count(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }
}

impl DebugBackend for MockBackend {
    fn create_target(&self) -> Result<TargetHandle> {
        if self.fail_create_target {
            return Err(Error::CreateTarget("mock create_target failure".into()));
        }
        Ok(TargetHandle::new(
            self.next_target.fetch_add(1, Ordering::Relaxed),
        ))
    }

    fn attach(&self, target: &TargetHandle, pid: u32) -> Result<ProcessHandle> {
        if self.fail_attach {
            return Err(Error::Attach {
                pid,
                reason: "mock attach failure".into(),
            });
        }
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProcessHandle::new(target, pid))
    }

    fn state(&self, _process: &ProcessHandle) -> ProcessState {
        self.state
    }

    fn threads<'a>(
        &'a self,
        _process: &ProcessHandle,
    ) -> Box<dyn Iterator<Item = ThreadHandle> + 'a> {
        // Deliberately unbounded: the consumer's walk bound is under test.
        Box::new(self.threads.iter().map(|t| ThreadHandle {
            tid: t.tid,
            name: t.name.clone(),
        }))
    }

    fn frames<'a>(
        &'a self,
        _process: &ProcessHandle,
        thread: &ThreadHandle,
    ) -> Box<dyn Iterator<Item = FrameSnapshot> + 'a> {
        let frames = self
            .threads
            .iter()
            .find(|t| t.tid == thread.tid)
            .map(|t| t.frames.clone())
            .unwrap_or_default();
        Box::new(
            frames
                .into_iter()
                .enumerate()
                .map(|(index, text)| FrameSnapshot::new(index as u32, text)),
        )
    }

    fn resume(&self, _process: &ProcessHandle) -> Result<()> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach(&self, _process: &ProcessHandle) -> Result<()> {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
