#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Android Debug Bridge subprocess façade.
//!
//! Every interaction with a device goes through the host `adb` binary: one
//! long-running `shell find` to enumerate a remote tree, one `pull` per
//! transferred file, and `devices` for discovery. The per-invocation latency
//! of adb (hundreds of milliseconds) shapes the API: [`scan::scan_remote`]
//! amortises it across the whole tree with a single streamed `find`, and the
//! engine schedules `pull` invocations in parallel.
//!
//! Remote paths handed to `adb shell` are always wrapped by
//! [`command::quote_shell`]; callers never splice raw path fragments into a
//! shell command line. `adb pull` arguments bypass the device shell and are
//! passed through untouched.

mod client;
mod command;
mod devices;
mod error;
pub mod scan;

pub use client::{AdbClient, DEFAULT_PULL_TIMEOUT, DEFAULT_SHELL_TIMEOUT};
pub use command::{quote_shell, AdbCommand, AdbStream};
pub use devices::{DeviceInfo, DeviceState};
pub use error::AdbError;
pub use scan::ScanError;
