//! Thread and frame snapshots captured from a stopped target.
//!
//! These are the data carried from the debug backend to the report
//! writer. Both levels of the walk are bounded so a corrupted or
//! adversarial target can never produce an unbounded report.

use serde::{Deserialize, Serialize};

/// Maximum number of threads walked per target process.
pub const MAX_THREADS: usize = 100;

/// Maximum number of frames walked per thread.
pub const MAX_FRAMES: usize = 100;

/// State of the target process as reported by the debug backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Target is stopped and safe to introspect.
    Stopped,
    /// Target is runnable or sleeping.
    Running,
    /// Target has exited (zombie or reaped).
    Exited,
    /// Target no longer exists or is inaccessible.
    Invalid,
    /// State could not be classified.
    Unknown,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Exited => write!(f, "exited"),
            ProcessState::Invalid => write!(f, "invalid"),
            ProcessState::Unknown => write!(f, "unknown"),
        }
    }
}

/// One stack frame of one thread, as opaque text.
///
/// The backend decides what the text contains (symbol, address, raw
/// kernel stack line); the report writer treats it as a black box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Zero-based frame index, innermost first.
    pub index: u32,
    /// Opaque frame description.
    pub text: String,
}

impl FrameSnapshot {
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// One live thread of the target with its walked stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    /// Kernel thread id.
    pub tid: u32,
    /// Thread name, when the backend can resolve one.
    pub name: Option<String>,
    /// Walked frames, innermost first, at most [`MAX_FRAMES`].
    pub frames: Vec<FrameSnapshot>,
}

impl ThreadSnapshot {
    pub fn new(tid: u32) -> Self {
        Self {
            tid,
            name: None,
            frames: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn push_frame(&mut self, text: impl Into<String>) {
        let index = self.frames.len() as u32;
        self.frames.push(FrameSnapshot::new(index, text));
    }
}
