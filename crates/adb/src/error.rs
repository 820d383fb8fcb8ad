use std::ffi::OsString;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failure reported by an adb invocation.
#[derive(Debug, Error)]
pub enum AdbError {
    /// The adb binary could not be launched at all.
    #[error("failed to launch adb ({program:?}): {source}")]
    Spawn {
        /// Program path that failed to start.
        program: OsString,
        /// Underlying spawn error.
        source: io::Error,
    },
    /// The invocation exceeded its per-call timeout and was killed.
    #[error("adb {operation} timed out after {timeout:?}")]
    Timeout {
        /// Short description of the adb subcommand.
        operation: String,
        /// Configured timeout that elapsed.
        timeout: Duration,
    },
    /// adb exited with a non-zero status.
    #[error("adb {operation} failed (exit {code}): {stderr}")]
    Exit {
        /// Short description of the adb subcommand.
        operation: String,
        /// Exit code (or -1 when killed by a signal).
        code: i32,
        /// Trimmed stderr text, possibly empty.
        stderr: String,
    },
    /// Reading from or waiting on the child failed.
    #[error("adb {operation} I/O failure: {source}")]
    Io {
        /// Short description of the adb subcommand.
        operation: String,
        /// Underlying I/O error.
        source: io::Error,
    },
}

impl AdbError {
    /// Whether the failure is worth retrying.
    ///
    /// A non-zero exit that produced no diagnostics is indistinguishable from
    /// a dropped transport and is retried; an exit with stderr text is a
    /// device-side answer and treated as permanent. Timeouts and host I/O
    /// hiccups are retried. A missing adb binary never heals by itself.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            AdbError::Spawn { .. } => false,
            AdbError::Timeout { .. } | AdbError::Io { .. } => true,
            AdbError::Exit { stderr, .. } => stderr.is_empty(),
        }
    }
}
