//! Real debug backend over ptrace and /proc.
//!
//! Attach suspends the target with `PTRACE_ATTACH` and waits for the
//! tracing stop; threads come from `/proc/[pid]/task`, frames from the
//! per-thread kernel stack file with a synthesized fallback frame when
//! that file is unreadable (it needs privilege). Symbolication is out
//! of scope; frames are opaque text.

use crate::procfs;
use crate::{DebugBackend, ProcessHandle, TargetHandle, ThreadHandle};
use ct_common::{Error, FrameSnapshot, ProcessState, Result, MAX_FRAMES, MAX_THREADS};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Debug backend backed by ptrace.
#[derive(Debug, Default)]
pub struct PtraceBackend {
    next_target: AtomicU64,
}

impl PtraceBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DebugBackend for PtraceBackend {
    fn create_target(&self) -> Result<TargetHandle> {
        // No kernel resource is held until attach; the handle only
        // names the slot.
        let id = self.next_target.fetch_add(1, Ordering::Relaxed);
        Ok(TargetHandle::new(id))
    }

    fn attach(&self, target: &TargetHandle, pid: u32) -> Result<ProcessHandle> {
        let nix_pid = Pid::from_raw(pid as i32);
        nix::sys::ptrace::attach(nix_pid).map_err(|errno| Error::Attach {
            pid,
            reason: errno.to_string(),
        })?;

        // The attach is asynchronous; wait for the tracing stop before
        // reporting success so state queries see a settled target.
        match waitpid(nix_pid, None) {
            Ok(WaitStatus::Stopped(_, signal)) => {
                debug!(pid, signal = ?signal, "target reached tracing stop");
                Ok(ProcessHandle::new(target, pid))
            }
            Ok(status) => {
                // Attached but the target did not stop (e.g. it exited
                // under us). Release the attach before failing.
                let _ = nix::sys::ptrace::detach(nix_pid, None);
                Err(Error::Attach {
                    pid,
                    reason: format!("unexpected wait status: {status:?}"),
                })
            }
            Err(errno) => {
                let _ = nix::sys::ptrace::detach(nix_pid, None);
                Err(Error::Attach {
                    pid,
                    reason: format!("wait for stop failed: {errno}"),
                })
            }
        }
    }

    fn state(&self, process: &ProcessHandle) -> ProcessState {
        procfs::process_state(process.pid)
    }

    fn threads<'a>(
        &'a self,
        process: &ProcessHandle,
    ) -> Box<dyn Iterator<Item = ThreadHandle> + 'a> {
        let pid = process.pid;
        let tids = procfs::task_tids(pid).unwrap_or_default();
        Box::new(tids.into_iter().take(MAX_THREADS).map(move |tid| {
            ThreadHandle {
                tid,
                name: procfs::thread_name(pid, tid),
            }
        }))
    }

    fn frames<'a>(
        &'a self,
        process: &ProcessHandle,
        thread: &ThreadHandle,
    ) -> Box<dyn Iterator<Item = FrameSnapshot> + 'a> {
        let lines = match procfs::kernel_stack(process.pid, thread.tid) {
            Ok(stack) => procfs::parse_kernel_stack(&stack),
            Err(err) => {
                debug!(
                    pid = process.pid,
                    tid = thread.tid,
                    error = %err,
                    "kernel stack unreadable, synthesizing frame"
                );
                vec![format!(
                    "<stack unavailable for tid {} ({})>",
                    thread.tid,
                    thread.name.as_deref().unwrap_or("?")
                )]
            }
        };
        Box::new(
            lines
                .into_iter()
                .take(MAX_FRAMES)
                .enumerate()
                .map(|(index, text)| FrameSnapshot::new(index as u32, text)),
        )
    }

    fn resume(&self, process: &ProcessHandle) -> Result<()> {
        nix::sys::ptrace::cont(Pid::from_raw(process.pid as i32), None).map_err(|errno| {
            Error::Resume {
                pid: process.pid,
                reason: errno.to_string(),
            }
        })
    }

    fn detach(&self, process: &ProcessHandle) -> Result<()> {
        nix::sys::ptrace::detach(Pid::from_raw(process.pid as i32), None).map_err(|errno| {
            Error::Detach {
                pid: process.pid,
                reason: errno.to_string(),
            }
        })
    }
}
