//! Remote tree enumeration.
//!
//! One `adb shell find` round-trip produces the whole inventory; with adb's
//! per-invocation latency in the hundreds of milliseconds, per-entry
//! stat'ing over the shell would make large trees intractable. The fast path
//! relies on `find -printf` with NUL record separators so filenames
//! containing newlines survive the wire. Devices whose `find` lacks
//! `-printf` fall back to a two-phase `find -print0` + batched `stat`
//! sweep; devices lacking both are rejected.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use filters::FilterSet;
use flist::{FileKind, FileRecord, Inventory};

use crate::client::AdbClient;
use crate::command::quote_shell;
use crate::error::AdbError;

use thiserror::Error;

/// `find -printf` format of the fast path: `type \t size \t mtime \t path NUL`.
///
/// The escapes are expanded by `find` on the device, not by the host shell.
pub const FIND_FORMAT: &str = r"%y\t%s\t%T@\t%p\0";

/// Batch size for the `stat` fallback; bounds the remote command line.
const STAT_BATCH: usize = 64;

/// Failure while enumerating a remote tree.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The underlying adb invocation failed.
    #[error(transparent)]
    Adb(#[from] AdbError),
    /// A record from the device did not match the expected format.
    ///
    /// The scan aborts; a partial inventory is never returned.
    #[error("unparseable scan record: {record:?}")]
    Parse {
        /// Lossy rendering of the offending record.
        record: String,
    },
    /// The remote root does not exist on the device.
    #[error("remote path {root:?} does not exist on device")]
    MissingRoot {
        /// The requested root.
        root: String,
    },
    /// Neither `find -printf` nor `stat` works on this device.
    #[error("device cannot enumerate {root:?}: find lacks -printf and stat is unusable")]
    Unsupported {
        /// The requested root.
        root: String,
    },
}

/// Joins a root-relative path onto the remote root with POSIX separators.
#[must_use]
pub fn join_remote(root: &OsStr, relative: &Path) -> OsString {
    let mut joined = trim_trailing_slash(os_bytes(root).as_ref()).to_vec();
    joined.push(b'/');
    joined.extend_from_slice(os_bytes(relative.as_os_str()).as_ref());
    bytes_to_os(&joined)
}

/// Enumerates the remote subtree rooted at `remote_root`.
///
/// Excluded entries are dropped as they stream in, so an inventory never
/// contains filtered paths. Symlinks and special files are recorded (the
/// reconciler wants to warn about them) but never followed.
pub fn scan_remote(
    client: &AdbClient,
    remote_root: &Path,
    filters: &FilterSet,
) -> Result<Inventory, ScanError> {
    let root_bytes = trim_trailing_slash(os_bytes(remote_root.as_os_str()).as_ref()).to_vec();
    let quoted = quote_shell(&bytes_to_os(&root_bytes));

    ensure_root_exists(client, &quoted, &root_bytes)?;

    if printf_supported(client, &quoted)? {
        scan_with_printf(client, &quoted, &root_bytes, filters)
    } else {
        warn!("device find lacks -printf, using stat fallback");
        scan_with_stat(client, &quoted, &root_bytes, filters)
    }
}

fn ensure_root_exists(
    client: &AdbClient,
    quoted_root: &OsStr,
    root_bytes: &[u8],
) -> Result<(), ScanError> {
    let mut probe = OsString::from("find ");
    probe.push(quoted_root);
    probe.push(" -maxdepth 0");
    match client.shell_output(&probe) {
        Ok(stdout) if !stdout.is_empty() => Ok(()),
        Ok(_) => Err(ScanError::MissingRoot {
            root: String::from_utf8_lossy(root_bytes).into_owned(),
        }),
        Err(AdbError::Exit { .. }) => Err(ScanError::MissingRoot {
            root: String::from_utf8_lossy(root_bytes).into_owned(),
        }),
        Err(error) => Err(error.into()),
    }
}

fn printf_supported(client: &AdbClient, quoted_root: &OsStr) -> Result<bool, ScanError> {
    let mut probe = OsString::from("find ");
    probe.push(quoted_root);
    probe.push(" -maxdepth 0 -printf '%y\\0'");
    match client.shell_output(&probe) {
        Ok(stdout) => Ok(!stdout.is_empty()),
        Err(AdbError::Exit { .. }) => Ok(false),
        Err(error) => Err(error.into()),
    }
}

fn scan_with_printf(
    client: &AdbClient,
    quoted_root: &OsStr,
    root_bytes: &[u8],
    filters: &FilterSet,
) -> Result<Inventory, ScanError> {
    let mut command = OsString::from("find ");
    command.push(quoted_root);
    command.push(format!(" -printf '{FIND_FORMAT}'"));

    let mut stream = client.shell_stream(&command)?;
    let mut inventory = Inventory::new();
    let mut records = 0_u64;
    while let Some(record) = stream.next_record(b'\0')? {
        records += 1;
        if let Some((path, file_record)) = parse_printf_record(&record, root_bytes)? {
            insert_filtered(&mut inventory, path, file_record, filters);
        }
    }
    stream.finish()?;
    debug!(records, entries = inventory.len(), "remote scan complete");
    Ok(inventory)
}

/// Parses one `type \t size \t mtime \t path` record. Returns `None` for the
/// root entry itself.
fn parse_printf_record(
    record: &[u8],
    root_bytes: &[u8],
) -> Result<Option<(PathBuf, FileRecord)>, ScanError> {
    let malformed = || ScanError::Parse {
        record: String::from_utf8_lossy(record).into_owned(),
    };

    let mut fields = record.splitn(4, |&byte| byte == b'\t');
    let kind_field = fields.next().ok_or_else(malformed)?;
    let size_field = fields.next().ok_or_else(malformed)?;
    let mtime_field = fields.next().ok_or_else(malformed)?;
    let path_field = fields.next().ok_or_else(malformed)?;

    if kind_field.len() != 1 {
        return Err(malformed());
    }
    let kind = FileKind::from_find_type(kind_field[0]);
    let size: u64 = ascii_str(size_field)
        .and_then(|text| text.parse().ok())
        .ok_or_else(malformed)?;
    // %T@ carries a fractional part; comparisons run on whole seconds.
    let mtime: i64 = ascii_str(mtime_field)
        .and_then(|text| text.parse::<f64>().ok())
        .map(|seconds| seconds as i64)
        .ok_or_else(malformed)?;

    let Some(relative) = strip_root(path_field, root_bytes) else {
        return Err(malformed());
    };
    if relative.is_empty() {
        return Ok(None);
    }

    let size = if kind.is_file() { size } else { 0 };
    Ok(Some((
        PathBuf::from(bytes_to_os(relative)),
        FileRecord::new(kind, size, mtime),
    )))
}

fn scan_with_stat(
    client: &AdbClient,
    quoted_root: &OsStr,
    root_bytes: &[u8],
    filters: &FilterSet,
) -> Result<Inventory, ScanError> {
    let mut command = OsString::from("find ");
    command.push(quoted_root);
    command.push(" -print0");
    let listing = client.shell_output(&command)?;

    let paths: Vec<&[u8]> = listing
        .split(|&byte| byte == b'\0')
        .filter(|path| !path.is_empty())
        .filter(|path| !strip_root(path, root_bytes).is_some_and(<[u8]>::is_empty))
        .collect();

    let mut inventory = Inventory::new();
    let mut first_batch = true;
    for batch in paths.chunks(STAT_BATCH) {
        // Real tab bytes: stat -c does not expand backslash escapes the way
        // find -printf does.
        let mut command = OsString::from("stat -c '%F\t%s\t%Y\t%n'");
        for path in batch {
            command.push(" ");
            command.push(quote_shell(&bytes_to_os(path)));
        }
        let output = match client.shell_output(&command) {
            Ok(output) => output,
            // stat may be missing entirely or reject -c; either way the
            // device cannot serve this scan.
            Err(AdbError::Exit { .. }) if first_batch => {
                return Err(ScanError::Unsupported {
                    root: String::from_utf8_lossy(root_bytes).into_owned(),
                });
            }
            Err(error) => return Err(error.into()),
        };
        first_batch = false;

        for record in output.split(|&byte| byte == b'\n') {
            if record.is_empty() {
                continue;
            }
            if let Some((path, file_record)) = parse_stat_record(record, root_bytes)? {
                insert_filtered(&mut inventory, path, file_record, filters);
            }
        }
    }
    debug!(entries = inventory.len(), "remote scan complete (stat fallback)");
    Ok(inventory)
}

/// Parses one `stat -c '%F\t%s\t%Y\t%n'` line.
///
/// Filenames containing newlines are not representable in this fallback;
/// such records surface as parse errors rather than silent corruption.
fn parse_stat_record(
    record: &[u8],
    root_bytes: &[u8],
) -> Result<Option<(PathBuf, FileRecord)>, ScanError> {
    let malformed = || ScanError::Parse {
        record: String::from_utf8_lossy(record).into_owned(),
    };

    let mut fields = record.splitn(4, |&byte| byte == b'\t');
    let kind_field = fields.next().ok_or_else(malformed)?;
    let size_field = fields.next().ok_or_else(malformed)?;
    let mtime_field = fields.next().ok_or_else(malformed)?;
    let path_field = fields.next().ok_or_else(malformed)?;

    let kind = match kind_field {
        b"regular file" | b"regular empty file" => FileKind::File,
        b"directory" => FileKind::Dir,
        b"symbolic link" => FileKind::Symlink,
        _ => FileKind::Other,
    };
    let size: u64 = ascii_str(size_field)
        .and_then(|text| text.parse().ok())
        .ok_or_else(malformed)?;
    let mtime: i64 = ascii_str(mtime_field)
        .and_then(|text| text.parse().ok())
        .ok_or_else(malformed)?;

    let Some(relative) = strip_root(path_field, root_bytes) else {
        return Err(malformed());
    };
    if relative.is_empty() {
        return Ok(None);
    }

    let size = if kind.is_file() { size } else { 0 };
    Ok(Some((
        PathBuf::from(bytes_to_os(relative)),
        FileRecord::new(kind, size, mtime),
    )))
}

fn insert_filtered(
    inventory: &mut Inventory,
    path: PathBuf,
    record: FileRecord,
    filters: &FilterSet,
) {
    if filters.allows(&path, record.kind().is_dir()) {
        inventory.insert(path, record);
    }
}

fn strip_root<'a>(path: &'a [u8], root: &[u8]) -> Option<&'a [u8]> {
    let rest = path.strip_prefix(root)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix(b"/")
}

fn trim_trailing_slash(bytes: &[u8]) -> &[u8] {
    if bytes.len() > 1 && bytes.ends_with(b"/") {
        &bytes[..bytes.len() - 1]
    } else {
        bytes
    }
}

fn ascii_str(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}

fn os_bytes(value: &OsStr) -> Cow<'_, [u8]> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Cow::Borrowed(value.as_bytes())
    }

    #[cfg(not(unix))]
    {
        Cow::Owned(value.to_string_lossy().into_owned().into_bytes())
    }
}

fn bytes_to_os(bytes: &[u8]) -> OsString {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        OsString::from_vec(bytes.to_vec())
    }

    #[cfg(not(unix))]
    {
        OsString::from(String::from_utf8_lossy(bytes).into_owned())
    }
}
