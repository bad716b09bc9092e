//! Parsers and readers for /proc filesystem files.
//!
//! The parsing functions are pure (string in, value out) so they can
//! be unit-tested and fuzzed without a live process; the reading
//! functions wrap them over the real /proc tree.
//!
//! # Files read
//! - `/proc/[pid]/stat` - process/thread state field
//! - `/proc/[pid]/exe` - executable image path
//! - `/proc/[pid]/task/` - thread ids
//! - `/proc/[pid]/task/[tid]/comm` - thread name
//! - `/proc/[pid]/task/[tid]/stack` - kernel stack (privileged)

use ct_common::{Error, ProcessState, Result};
use std::fs;
use std::path::PathBuf;

/// Extract the single-character state field from /proc/[pid]/stat.
///
/// The comm field is wrapped in parentheses and may itself contain
/// spaces and parentheses, so the state is the first non-space
/// character after the *last* closing parenthesis.
pub fn parse_stat_state(stat: &str) -> Option<char> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.chars().find(|c| !c.is_whitespace())
}

/// Classify a /proc stat state character.
pub fn state_from_char(c: char) -> ProcessState {
    match c {
        // T: job-control stop, t: tracing stop (what an attach produces)
        'T' | 't' => ProcessState::Stopped,
        'R' | 'S' | 'D' | 'I' | 'W' => ProcessState::Running,
        'Z' | 'X' | 'x' => ProcessState::Exited,
        _ => ProcessState::Unknown,
    }
}

/// Current state of a process, read from /proc.
///
/// A missing or unreadable stat file means the process is gone or
/// inaccessible, which maps to `Invalid`.
pub fn process_state(pid: u32) -> ProcessState {
    let path = format!("/proc/{pid}/stat");
    match fs::read_to_string(path) {
        Ok(stat) => match parse_stat_state(&stat) {
            Some(c) => state_from_char(c),
            None => ProcessState::Unknown,
        },
        Err(_) => ProcessState::Invalid,
    }
}

/// Resolve the basename of a process's executable image.
pub fn exe_basename(pid: u32) -> Result<String> {
    let link = PathBuf::from(format!("/proc/{pid}/exe"));
    let target = fs::read_link(&link).map_err(|err| Error::ExeResolve {
        pid,
        reason: err.to_string(),
    })?;
    let name = target
        .file_name()
        .ok_or_else(|| Error::ExeResolve {
            pid,
            reason: "executable path has no basename".to_string(),
        })?
        .to_string_lossy()
        .into_owned();
    Ok(name)
}

/// Thread ids of a process, ascending.
pub fn task_tids(pid: u32) -> std::io::Result<Vec<u32>> {
    let mut tids: Vec<u32> = fs::read_dir(format!("/proc/{pid}/task"))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_string_lossy().parse().ok())
        .collect();
    tids.sort_unstable();
    Ok(tids)
}

/// Name of one thread, when readable.
pub fn thread_name(pid: u32, tid: u32) -> Option<String> {
    let comm = fs::read_to_string(format!("/proc/{pid}/task/{tid}/comm")).ok()?;
    let name = comm.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Kernel stack of one thread. Needs privilege; callers fall back to a
/// synthesized frame when this fails.
pub fn kernel_stack(pid: u32, tid: u32) -> std::io::Result<String> {
    fs::read_to_string(format!("/proc/{pid}/task/{tid}/stack"))
}

/// Parse kernel stack text into frame lines.
///
/// Lines look like `[<0>] do_wait+0x1c5/0x2f0`; blank lines are
/// skipped, everything else is kept verbatim.
pub fn parse_kernel_stack(stack: &str) -> Vec<String> {
    stack
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT_STOPPED: &str = "1234 (worker) t 1 1234 1234 0 -1 4194624 1045 0 0 0 12 4 0 0 20 0 4 0 12345 8192000 512 18446744073709551615";

    #[test]
    fn test_parse_stat_state_basic() {
        assert_eq!(parse_stat_state(STAT_STOPPED), Some('t'));
        assert_eq!(parse_stat_state("1 (init) S 0 1 1 0"), Some('S'));
    }

    #[test]
    fn test_parse_stat_state_tricky_comm() {
        // comm may contain spaces and parens; state follows the LAST ')'
        let stat = "42 (a (weird) name) R 1 42 42 0";
        assert_eq!(parse_stat_state(stat), Some('R'));
    }

    #[test]
    fn test_parse_stat_state_malformed() {
        assert_eq!(parse_stat_state(""), None);
        assert_eq!(parse_stat_state("no parens here"), None);
        assert_eq!(parse_stat_state("1 (comm)"), None);
    }

    #[test]
    fn test_state_from_char() {
        assert_eq!(state_from_char('T'), ProcessState::Stopped);
        assert_eq!(state_from_char('t'), ProcessState::Stopped);
        assert_eq!(state_from_char('R'), ProcessState::Running);
        assert_eq!(state_from_char('S'), ProcessState::Running);
        assert_eq!(state_from_char('D'), ProcessState::Running);
        assert_eq!(state_from_char('Z'), ProcessState::Exited);
        assert_eq!(state_from_char('?'), ProcessState::Unknown);
    }

    #[test]
    fn test_parse_kernel_stack() {
        let stack = "[<0>] do_wait+0x1c5/0x2f0\n[<0>] kernel_wait4+0xa6/0x140\n\n[<0>] do_syscall_64+0x5b/0x170\n";
        let frames = parse_kernel_stack(stack);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], "[<0>] do_wait+0x1c5/0x2f0");
        assert_eq!(frames[2], "[<0>] do_syscall_64+0x5b/0x170");
    }

    #[test]
    fn test_parse_kernel_stack_empty() {
        assert!(parse_kernel_stack("").is_empty());
        assert!(parse_kernel_stack("\n\n").is_empty());
    }

    #[test]
    fn test_process_state_self() {
        // Our own process is certainly not stopped or gone.
        let state = process_state(std::process::id());
        assert_eq!(state, ProcessState::Running);
    }

    #[test]
    fn test_exe_basename_self() {
        let name = exe_basename(std::process::id()).unwrap();
        assert!(!name.is_empty());
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_exe_basename_gone_pid() {
        // Pid 0 has no /proc entry from userspace.
        let err = exe_basename(0).unwrap_err();
        assert_eq!(err.code(), 50);
    }

    #[test]
    fn test_task_tids_self() {
        let tids = task_tids(std::process::id()).unwrap();
        assert!(tids.contains(&std::process::id()));
    }
}
