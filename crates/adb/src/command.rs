use std::ffi::{OsStr, OsString};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::AdbError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Wraps `value` for safe interpolation into an `adb shell` command line.
///
/// Single-quote wrapping with embedded single quotes escaped as `'\''`. This
/// is the only sanctioned way to put a remote path into a shell command.
#[must_use]
pub fn quote_shell(value: &OsStr) -> OsString {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};
        let mut out: Vec<u8> = Vec::with_capacity(value.len() + 2);
        out.push(b'\'');
        for &byte in value.as_bytes() {
            if byte == b'\'' {
                out.extend_from_slice(b"'\\''");
            } else {
                out.push(byte);
            }
        }
        out.push(b'\'');
        OsString::from_vec(out)
    }

    #[cfg(not(unix))]
    {
        let mut quoted = OsString::from("'");
        let text = value.to_string_lossy();
        quoted.push(text.replace('\'', "'\\''"));
        quoted.push("'");
        quoted
    }
}

/// Builder for one adb invocation.
///
/// Mirrors the shape of [`std::process::Command`]: configure, then run with
/// [`output`](Self::output) (captured, bounded by a timeout) or
/// [`stream`](Self::stream) (incremental stdout for large scans). When a
/// serial is set, `-s <serial>` is inserted ahead of the subcommand so the
/// invocation is pinned to one device.
#[derive(Clone, Debug)]
pub struct AdbCommand {
    program: OsString,
    serial: Option<String>,
    args: Vec<OsString>,
    operation: String,
}

impl AdbCommand {
    /// Creates a builder invoking `program` (usually just `adb`).
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            serial: None,
            args: Vec::new(),
            operation: String::from("invocation"),
        }
    }

    /// Pins the invocation to the device with the given serial.
    pub fn serial(&mut self, serial: impl Into<String>) -> &mut Self {
        self.serial = Some(serial.into());
        self
    }

    /// Labels the invocation for diagnostics (`shell find`, `pull`, ...).
    pub fn operation(&mut self, operation: impl Into<String>) -> &mut Self {
        self.operation = operation.into();
        self
    }

    /// Appends one argument.
    pub fn arg(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn build(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        if let Some(serial) = &self.serial {
            command.arg("-s").arg(serial);
        }
        command.args(&self.args);
        command
    }

    fn spawn(&self) -> Result<Child, AdbError> {
        trace!(operation = %self.operation, args = ?self.args, "spawning adb");
        self.build().spawn().map_err(|source| AdbError::Spawn {
            program: self.program.clone(),
            source,
        })
    }

    /// Runs the command to completion, returning captured stdout.
    ///
    /// The child is killed when `timeout` elapses. A non-zero exit becomes
    /// [`AdbError::Exit`] carrying the trimmed stderr text.
    pub fn output(&self, timeout: Duration) -> Result<Vec<u8>, AdbError> {
        let mut child = self.spawn()?;
        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        join_bytes(stdout_handle);
                        join_bytes(stderr_handle);
                        return Err(AdbError::Timeout {
                            operation: self.operation.clone(),
                            timeout,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    let _ = child.kill();
                    return Err(AdbError::Io {
                        operation: self.operation.clone(),
                        source,
                    });
                }
            }
        };

        let stdout = join_bytes(stdout_handle);
        let stderr = join_bytes(stderr_handle);
        if status.success() {
            Ok(stdout)
        } else {
            Err(AdbError::Exit {
                operation: self.operation.clone(),
                code: status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            })
        }
    }

    /// Spawns the command for incremental stdout consumption.
    ///
    /// A watchdog kills the child when `timeout` elapses, which surfaces to
    /// the reader as end-of-stream; [`AdbStream::finish`] then reports
    /// [`AdbError::Timeout`].
    pub fn stream(&self, timeout: Duration) -> Result<AdbStream, AdbError> {
        let mut child = self.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| AdbError::Io {
            operation: self.operation.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "adb did not expose a readable stdout",
            ),
        })?;
        let stderr_handle = drain(child.stderr.take());

        let child = Arc::new(Mutex::new(child));
        let done = Arc::new(AtomicBool::new(false));
        let timed_out = Arc::new(AtomicBool::new(false));
        let watchdog = {
            let child = Arc::clone(&child);
            let done = Arc::clone(&done);
            let timed_out = Arc::clone(&timed_out);
            let deadline = Instant::now() + timeout;
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    if Instant::now() >= deadline {
                        timed_out.store(true, Ordering::Release);
                        if let Ok(mut child) = child.lock() {
                            let _ = child.kill();
                        }
                        return;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })
        };

        Ok(AdbStream {
            operation: self.operation.clone(),
            timeout,
            reader: BufReader::new(stdout),
            stderr_handle: Some(stderr_handle),
            child,
            done,
            timed_out,
            watchdog: Some(watchdog),
        })
    }
}

/// Incremental stdout of a running adb invocation.
pub struct AdbStream {
    operation: String,
    timeout: Duration,
    reader: BufReader<ChildStdout>,
    stderr_handle: Option<JoinHandle<Vec<u8>>>,
    child: Arc<Mutex<Child>>,
    done: Arc<AtomicBool>,
    timed_out: Arc<AtomicBool>,
    watchdog: Option<JoinHandle<()>>,
}

impl AdbStream {
    /// Reads the next `delimiter`-terminated record, without the delimiter.
    ///
    /// Returns `Ok(None)` at end of stream. A trailing unterminated record is
    /// still yielded.
    pub fn next_record(&mut self, delimiter: u8) -> Result<Option<Vec<u8>>, AdbError> {
        let mut record = Vec::new();
        let read = self
            .reader
            .read_until(delimiter, &mut record)
            .map_err(|source| AdbError::Io {
                operation: self.operation.clone(),
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        if record.last() == Some(&delimiter) {
            record.pop();
        }
        Ok(Some(record))
    }

    /// Waits for the child and classifies its exit.
    pub fn finish(mut self) -> Result<(), AdbError> {
        self.done.store(true, Ordering::Release);
        if let Some(watchdog) = self.watchdog.take() {
            let _ = watchdog.join();
        }

        let status = {
            let mut child = self.child.lock().map_err(|_| AdbError::Io {
                operation: self.operation.clone(),
                source: std::io::Error::other("adb watchdog poisoned"),
            })?;
            child.wait().map_err(|source| AdbError::Io {
                operation: self.operation.clone(),
                source,
            })?
        };
        let stderr = self.stderr_handle.take().map(join_bytes).unwrap_or_default();

        if self.timed_out.load(Ordering::Acquire) {
            return Err(AdbError::Timeout {
                operation: self.operation.clone(),
                timeout: self.timeout,
            });
        }
        if status.success() {
            Ok(())
        } else {
            Err(AdbError::Exit {
                operation: self.operation.clone(),
                code: status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            })
        }
    }
}

impl Drop for AdbStream {
    fn drop(&mut self) {
        self.done.store(true, Ordering::Release);
        if let Some(watchdog) = self.watchdog.take() {
            let _ = watchdog.join();
        }
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buffer);
        }
        buffer
    })
}

fn join_bytes(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}
