use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, info, warn};

use adb::scan::scan_remote;
use adb::AdbClient;
use walk::scan_local;

use crate::error::{ActionFailure, EngineError};
use crate::executor::execute;
use crate::hardlink::{self, LinkSupport};
use crate::options::PullOptions;
use crate::plan::plan;

/// Result of one pull run.
#[derive(Debug, Default)]
pub struct PullSummary {
    /// Files transferred from the device.
    pub files_pulled: u64,
    /// Files hard-linked out of the reference snapshot.
    pub files_linked: u64,
    /// Files byte-copied out of the reference snapshot.
    pub files_copied: u64,
    /// Stale local entries removed.
    pub files_deleted: u64,
    /// Directories created.
    pub dirs_created: u64,
    /// Bytes moved over adb.
    pub bytes_transferred: u64,
    /// Remote files already present and matching locally.
    pub files_unchanged: u64,
    /// Remote symlinks/special files skipped with a warning.
    pub files_skipped: u64,
    /// Stale `.tmp-*` staging files removed at startup.
    pub staging_cleaned: u64,
    /// Per-file failures that survived retries.
    pub failures: Vec<ActionFailure>,
}

impl PullSummary {
    /// Whether every planned action completed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Mirrors `options.remote_root` on the device into `options.local_root`.
///
/// Sequencing: validate options, prepare the target directory, sweep stale
/// staging files, probe hard-link support when a reference snapshot is
/// configured, scan both sides concurrently, reconcile, execute. `cancel`
/// is observed between phases and between file actions; a cancelled run
/// returns [`EngineError::Cancelled`] with all staging files removed.
pub fn pull(
    client: &AdbClient,
    options: &PullOptions,
    cancel: &AtomicBool,
) -> Result<PullSummary, EngineError> {
    options.validate()?;

    let client = client
        .clone()
        .with_shell_timeout(options.shell_timeout)
        .with_pull_timeout(options.pull_timeout);

    fs::create_dir_all(&options.local_root)
        .map_err(|source| EngineError::filesystem(&options.local_root, source))?;
    let staging_cleaned = clean_stale_staging(&options.local_root);
    if staging_cleaned > 0 {
        info!(count = staging_cleaned, "removed stale staging files");
    }

    let reference_root = resolve_reference(options);

    let (remote_result, local_result, reference_result) = thread::scope(|scope| {
        let remote_handle =
            scope.spawn(|| scan_remote(&client, &options.remote_root, &options.filters));
        let local = scan_local(&options.local_root, &options.filters);
        let reference = reference_root
            .as_deref()
            .map(|root| scan_local(root, &options.filters));
        let remote = remote_handle
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (remote, local, reference)
    });

    let remote = remote_result?;
    let (local, local_errors) = local_result?;
    let reference = match reference_result {
        Some(Ok((inventory, _))) => Some(inventory),
        Some(Err(error)) => {
            warn!(%error, "reference snapshot unreadable, continuing without it");
            None
        }
        None => None,
    };
    if !local_errors.is_empty() {
        warn!(
            count = local_errors.len(),
            "some local entries could not be scanned"
        );
    }
    if cancel.load(Ordering::Acquire) {
        return Err(EngineError::Cancelled);
    }

    let link_support = match (&reference, &reference_root) {
        (Some(_), Some(root)) => hardlink::probe(root, &options.local_root),
        _ => LinkSupport::Unsupported,
    };

    debug!(
        remote = remote.len(),
        local = local.len(),
        reference = reference.as_ref().map_or(0, flist::Inventory::len),
        "inventories ready"
    );

    let plan = plan(&remote, &local, reference.as_ref(), options);
    let report = execute(&plan, &client, options, link_support, cancel)?;

    let summary = PullSummary {
        files_pulled: report.files_pulled,
        files_linked: report.files_linked,
        files_copied: report.files_copied,
        files_deleted: report.files_deleted,
        dirs_created: report.dirs_created,
        bytes_transferred: report.bytes_transferred,
        files_unchanged: plan.unchanged,
        files_skipped: plan.skipped_special,
        staging_cleaned,
        failures: report.failures,
    };
    info!(
        pulled = summary.files_pulled,
        linked = summary.files_linked,
        copied = summary.files_copied,
        deleted = summary.files_deleted,
        unchanged = summary.files_unchanged,
        bytes = summary.bytes_transferred,
        failures = summary.failures.len(),
        "pull finished"
    );
    Ok(summary)
}

/// Validates the configured reference snapshot.
///
/// A missing reference is not an error (first run of a multi-version
/// backup); a reference that resolves to the target itself is ignored so a
/// mis-set `latest` link cannot make the run link files onto themselves.
fn resolve_reference(options: &PullOptions) -> Option<PathBuf> {
    let reference = options.reference.as_ref()?;
    if !reference.is_dir() {
        warn!(reference = %reference.display(), "reference snapshot does not exist, ignoring");
        return None;
    }
    match (fs::canonicalize(reference), fs::canonicalize(&options.local_root)) {
        (Ok(reference_canonical), Ok(local_canonical))
            if reference_canonical == local_canonical =>
        {
            warn!(
                reference = %reference.display(),
                "reference snapshot is the target itself, ignoring"
            );
            None
        }
        _ => Some(reference.clone()),
    }
}

/// Removes `.tmp-*` staging files left behind by a crashed run.
///
/// Walks the whole target (exclude rules do not apply here; a crash may
/// have left staging files anywhere) and never descends into symlinks.
fn clean_stale_staging(root: &Path) -> u64 {
    let mut removed = 0;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(metadata) = fs::symlink_metadata(&path) else {
                continue;
            };
            if metadata.is_dir() {
                pending.push(path);
            } else if metadata.is_file() && is_staging_name(&path) {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "removed stale staging file");
                        removed += 1;
                    }
                    Err(error) => {
                        warn!(path = %path.display(), %error, "failed to remove staging file");
                    }
                }
            }
        }
    }
    removed
}

fn is_staging_name(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(".tmp-"))
        .unwrap_or(false)
}
