//! OS-level process inspection.
//!
//! The engine never trusts a bare PID: it only opens a handle after the
//! directory client has validated the PID against the server's control
//! channel. This module provides the handle abstraction and the procfs-backed
//! production implementation.

use crate::error::{Error, Result};
use procfs::ProcError;

/// Resource usage of one server process, as read in a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessStats {
    /// User-mode CPU time, in seconds.
    pub cpu_user: f64,
    /// Kernel-mode CPU time, in seconds.
    pub cpu_system: f64,
    /// Resident set size, in bytes.
    pub rss_bytes: u64,
    /// Data segment size, in bytes, where the platform reports one.
    pub data_bytes: Option<u64>,
    /// Number of OS threads.
    pub threads: i64,
}

/// Opens process handles by PID.
pub trait ProcessInspector: Send + Sync {
    /// Handle type produced by this inspector.
    type Handle: ProcessHandle;

    /// Open a handle to the process with the given PID.
    ///
    /// Returns [`Error::ProcessGone`] if the PID does not correspond to a
    /// live process.
    fn open(&self, pid: i32) -> Result<Self::Handle>;
}

/// A handle to a live (at time of opening) OS process.
pub trait ProcessHandle: Send {
    /// PID this handle was opened for.
    fn pid(&self) -> i32;

    /// Read the current resource usage.
    ///
    /// Returns [`Error::ProcessGone`] if the process has exited since the
    /// handle was opened; the engine treats that as a normal state
    /// transition.
    fn stats(&self) -> Result<ProcessStats>;
}

/// Process inspector backed by the Linux procfs.
pub struct ProcfsInspector {
    ticks_per_second: u64,
    page_size: u64,
}

impl ProcfsInspector {
    /// Create an inspector, caching the kernel's clock-tick and page-size
    /// constants.
    pub fn new() -> Self {
        Self {
            ticks_per_second: procfs::ticks_per_second(),
            page_size: procfs::page_size(),
        }
    }
}

impl Default for ProcfsInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInspector for ProcfsInspector {
    type Handle = ProcfsHandle;

    fn open(&self, pid: i32) -> Result<Self::Handle> {
        let process = procfs::process::Process::new(pid).map_err(|e| map_proc_error(pid, e))?;
        Ok(ProcfsHandle {
            pid,
            process,
            ticks_per_second: self.ticks_per_second,
            page_size: self.page_size,
        })
    }
}

/// Handle over `/proc/<pid>`.
pub struct ProcfsHandle {
    pid: i32,
    process: procfs::process::Process,
    ticks_per_second: u64,
    page_size: u64,
}

impl ProcessHandle for ProcfsHandle {
    fn pid(&self) -> i32 {
        self.pid
    }

    fn stats(&self) -> Result<ProcessStats> {
        let stat = self
            .process
            .stat()
            .map_err(|e| map_proc_error(self.pid, e))?;
        let statm = self
            .process
            .statm()
            .map_err(|e| map_proc_error(self.pid, e))?;

        let tps = self.ticks_per_second as f64;
        Ok(ProcessStats {
            cpu_user: stat.utime as f64 / tps,
            cpu_system: stat.stime as f64 / tps,
            rss_bytes: statm.resident * self.page_size,
            data_bytes: Some(statm.data * self.page_size),
            threads: stat.num_threads,
        })
    }
}

/// The /proc entry vanishing out from under us is the signal the engine cares
/// about; everything else is an inspection failure.
fn map_proc_error(pid: i32, err: ProcError) -> Error {
    match err {
        ProcError::NotFound(_) => Error::ProcessGone(pid),
        ProcError::Io(ref io, _) if io.kind() == std::io::ErrorKind::NotFound => {
            Error::ProcessGone(pid)
        }
        other => Error::Process(format!("pid {}: {}", pid, other)),
    }
}
