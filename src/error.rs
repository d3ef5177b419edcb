/// Error handling module for the TANGO exporter.
///
/// This module defines the error types used throughout the crate. The
/// reconciliation loop absorbs almost all of them at the tightest possible
/// scope (per server, or per starter record); only startup failures are
/// allowed to terminate the process.
use thiserror::Error;

/// Errors that can occur in the tango-exporter crate.
///
/// Each variant corresponds to one failure class of the exporter. Most carry
/// a human-readable payload; `ProcessGone` carries the PID so the engine can
/// match on it and treat the disappearance as a state transition rather than
/// an error.
#[derive(Error, Debug)]
pub enum Error {
    /// The TANGO database (registry) could not be reached or returned an
    /// error. The engine treats this as "no information this tick"; it is
    /// fatal only during startup.
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// A device control channel did not answer.
    ///
    /// A failed ping is indistinguishable from "not running" for metric
    /// purposes: the PID the registry reported may belong to an unrelated
    /// process.
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    /// The PID no longer corresponds to a live process.
    ///
    /// Raised both when opening a handle and when reading stats from a handle
    /// whose process has exited in the meantime.
    #[error("no such process: pid {0}")]
    ProcessGone(i32),

    /// Process inspection failed for a reason other than the process being
    /// gone (e.g. insufficient permissions to read /proc).
    #[error("process inspection error: {0}")]
    Process(String),

    /// A starter record did not have the expected shape. Skipped per record,
    /// never aborts a snapshot fetch.
    #[error("invalid starter record: {0}")]
    InvalidRecord(String),

    /// An attribute read returned something unusable.
    #[error("attribute read error: {0}")]
    Attribute(String),

    /// A metric could not be registered or encoded.
    #[error("metrics error: {0}")]
    Metrics(String),

    /// The exposition endpoint could not be set up. Fatal at startup.
    #[error("exposition error: {0}")]
    Exposition(String),

    /// Any other error not covered by the above categories.
    #[error("{0}")]
    Other(String),
}

/// Result type for tango-exporter operations.
pub type Result<T> = std::result::Result<T, Error>;
