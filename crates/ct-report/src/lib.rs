//! Crash report formatting and on-disk layout.
//!
//! The writer is pure serialization over any `io::Write` sink so it
//! can be tested against synthetic thread/frame data without a real
//! attach. Layout on disk:
//!
//! ```text
//! <report_dir>/<exe_name>/<pid>.crash
//! ```
//!
//! Report shape: a preamble identifying the target, then one header
//! line per thread followed by one indented line per frame:
//!
//! ```text
//! crash report for 'worker' (pid 1234)
//!
//! thread #1: tid = 101, name = 'main'
//!   frame #0: [<0>] do_wait+0x1c5/0x2f0
//!   frame #1: [<0>] do_syscall_64+0x5b/0x170
//! ```

use ct_common::ThreadSnapshot;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File extension for crash reports.
pub const REPORT_EXTENSION: &str = "crash";

/// Path of the report for `(exe_name, pid)` under `report_dir`.
///
/// Two executables sharing a pid value land in two distinct
/// directories; a repeat crash of the same pid maps to the same path
/// and overwrites.
pub fn report_path(report_dir: &Path, exe_name: &str, pid: u32) -> PathBuf {
    report_dir
        .join(exe_name)
        .join(format!("{pid}.{REPORT_EXTENSION}"))
}

/// Create the per-executable report directory. Idempotent: an already
/// existing directory is not an error.
pub fn ensure_report_dir(report_dir: &Path, exe_name: &str) -> io::Result<PathBuf> {
    let dir = report_dir.join(exe_name);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Incremental crash report writer over a sink.
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    sink: W,
    threads_written: usize,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            threads_written: 0,
        }
    }

    /// Write the preamble identifying the target.
    pub fn write_preamble(&mut self, exe_name: &str, pid: u32) -> io::Result<()> {
        writeln!(self.sink, "crash report for '{exe_name}' (pid {pid})")?;
        writeln!(self.sink)
    }

    /// Write one thread section: a header line, then its frames.
    pub fn write_thread(&mut self, thread: &ThreadSnapshot) -> io::Result<()> {
        self.threads_written += 1;
        match &thread.name {
            Some(name) => writeln!(
                self.sink,
                "thread #{}: tid = {}, name = '{}'",
                self.threads_written, thread.tid, name
            )?,
            None => writeln!(
                self.sink,
                "thread #{}: tid = {}",
                self.threads_written, thread.tid
            )?,
        }
        for frame in &thread.frames {
            writeln!(self.sink, "  frame #{}: {}", frame.index, frame.text)?;
        }
        Ok(())
    }

    /// Number of thread sections written so far.
    pub fn thread_count(&self) -> usize {
        self.threads_written
    }

    /// Flush and hand the sink back.
    pub fn finish(mut self) -> io::Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}
