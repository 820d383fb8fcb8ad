use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::command::{AdbCommand, AdbStream};
use crate::devices::{parse_devices, DeviceInfo};
use crate::error::AdbError;

/// Default per-call timeout for `adb shell` invocations.
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(120);
/// Default per-call timeout for `adb pull` invocations.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(300);

/// Handle on the host adb binary, optionally pinned to one device.
///
/// Cloneable and cheap; the executor clones one per worker so every pull owns
/// its own child process.
#[derive(Clone, Debug)]
pub struct AdbClient {
    program: OsString,
    serial: Option<String>,
    shell_timeout: Duration,
    pull_timeout: Duration,
}

impl AdbClient {
    /// Creates a client around `program`.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            serial: None,
            shell_timeout: DEFAULT_SHELL_TIMEOUT,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }

    /// Pins the client to the device with `serial`.
    #[must_use]
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Overrides the `adb shell` timeout.
    #[must_use]
    pub fn with_shell_timeout(mut self, timeout: Duration) -> Self {
        self.shell_timeout = timeout;
        self
    }

    /// Overrides the `adb pull` timeout.
    #[must_use]
    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Returns the pinned device serial, if any.
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Returns the configured shell timeout.
    #[must_use]
    pub const fn shell_timeout(&self) -> Duration {
        self.shell_timeout
    }

    /// Locates the adb binary to use.
    ///
    /// Precedence: an explicit path (`--adb`), the `ADBSYNC_ADB` environment
    /// variable, `$ANDROID_HOME/platform-tools/adb`, then plain `adb` on the
    /// search path.
    #[must_use]
    pub fn locate_program(explicit: Option<OsString>) -> OsString {
        if let Some(program) = explicit {
            return program;
        }
        if let Some(program) = env::var_os("ADBSYNC_ADB") {
            return program;
        }
        if let Some(home) = env::var_os("ANDROID_HOME") {
            let mut candidate = PathBuf::from(home);
            candidate.push("platform-tools");
            candidate.push(adb_binary_name());
            if candidate.exists() {
                return candidate.into_os_string();
            }
        }
        OsString::from("adb")
    }

    fn command(&self, operation: &str) -> AdbCommand {
        let mut command = AdbCommand::new(&self.program);
        command.operation(operation);
        if let Some(serial) = &self.serial {
            command.serial(serial);
        }
        command
    }

    /// Runs a single shell command on the device and captures its stdout.
    ///
    /// `remote_command` is passed to the device shell verbatim; embedded
    /// paths must already be wrapped by [`crate::quote_shell`].
    pub fn shell_output(&self, remote_command: &OsStr) -> Result<Vec<u8>, AdbError> {
        self.command("shell")
            .arg("shell")
            .arg(remote_command)
            .output(self.shell_timeout)
    }

    /// Like [`shell_output`](Self::shell_output) but streaming.
    pub fn shell_stream(&self, remote_command: &OsStr) -> Result<AdbStream, AdbError> {
        self.command("shell")
            .arg("shell")
            .arg(remote_command)
            .stream(self.shell_timeout)
    }

    /// Pulls one remote file into `local`, preserving its mtime (`-a`).
    ///
    /// The remote path goes to adb directly (no device shell involved), so it
    /// is passed unquoted.
    pub fn pull(&self, remote: &OsStr, local: &Path) -> Result<(), AdbError> {
        debug!(remote = ?remote, local = %local.display(), "adb pull");
        self.command("pull")
            .arg("pull")
            .arg("-a")
            .arg(remote)
            .arg(local)
            .output(self.pull_timeout)
            .map(drop)
    }

    /// Enumerates connected devices via `adb devices -l`.
    ///
    /// Never pinned to a serial; this is the discovery entry point.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        let mut command = AdbCommand::new(&self.program);
        command.operation("devices").arg("devices").arg("-l");
        let stdout = command.output(self.shell_timeout)?;
        Ok(parse_devices(&String::from_utf8_lossy(&stdout)))
    }
}

fn adb_binary_name() -> &'static str {
    if cfg!(windows) {
        "adb.exe"
    } else {
        "adb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_program_wins() {
        let program = AdbClient::locate_program(Some(OsString::from("/opt/adb")));
        assert_eq!(program, OsString::from("/opt/adb"));
    }

    #[test]
    fn falls_back_to_path_lookup() {
        // Guard against ambient configuration leaking into the assertion.
        if env::var_os("ADBSYNC_ADB").is_none() && env::var_os("ANDROID_HOME").is_none() {
            assert_eq!(AdbClient::locate_program(None), OsString::from("adb"));
        }
    }

    #[test]
    fn client_carries_serial() {
        let client = AdbClient::new("adb").with_serial("ABC123");
        assert_eq!(client.serial(), Some("ABC123"));
    }
}
