use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use filetime::FileTime;
use rand::random;
use tracing::{debug, info, warn};

use adb::scan::join_remote;
use adb::AdbClient;

use crate::error::{ActionError, ActionFailure, EngineError};
use crate::hardlink::LinkSupport;
use crate::options::PullOptions;
use crate::plan::{Action, Plan};

/// Backoff schedule between transfer attempts.
const BACKOFF: [Duration; 3] = [
    Duration::from_millis(250),
    Duration::from_secs(1),
    Duration::from_secs(4),
];

/// Outcome counters of one executed plan.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Files transferred from the device.
    pub files_pulled: u64,
    /// Files hard-linked out of the reference snapshot.
    pub files_linked: u64,
    /// Files byte-copied out of the reference snapshot.
    pub files_copied: u64,
    /// Stale entries removed.
    pub files_deleted: u64,
    /// Directories created.
    pub dirs_created: u64,
    /// Bytes moved over adb (reuse from the snapshot does not count).
    pub bytes_transferred: u64,
    /// Per-file failures that survived the retry policy.
    pub failures: Vec<ActionFailure>,
}

impl ExecutionReport {
    /// Whether every action completed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Counters {
    pulled: AtomicU64,
    linked: AtomicU64,
    copied: AtomicU64,
    deleted: AtomicU64,
    dirs: AtomicU64,
    bytes: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            pulled: AtomicU64::new(0),
            linked: AtomicU64::new(0),
            copied: AtomicU64::new(0),
            deleted: AtomicU64::new(0),
            dirs: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }
}

struct ExecContext<'a> {
    client: &'a AdbClient,
    options: &'a PullOptions,
    cancel: &'a AtomicBool,
    /// Flips to `false` on the first link failure and stays there; later
    /// reuse actions go straight to copy.
    link_ok: AtomicBool,
    counters: Counters,
    failures: Mutex<Vec<ActionFailure>>,
}

impl ExecContext<'_> {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn record_failure(&self, path: &Path, error: ActionError) {
        warn!(path = %path.display(), %error, "action failed");
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(ActionFailure {
                path: path.to_path_buf(),
                error,
            });
        }
    }
}

/// Executes `plan` against the local target.
///
/// Directory creations run first in plan order, file transfers and snapshot
/// reuse run on a pool of `options.concurrency` workers, deletions run last.
/// Per-file failures are collected, not propagated; cancellation aborts with
/// [`EngineError::Cancelled`] after in-flight actions wind down.
pub(crate) fn execute(
    plan: &Plan,
    client: &AdbClient,
    options: &PullOptions,
    link_support: LinkSupport,
    cancel: &AtomicBool,
) -> Result<ExecutionReport, EngineError> {
    if options.dry_run {
        return Ok(dry_run_report(plan));
    }

    let context = ExecContext {
        client,
        options,
        cancel,
        link_ok: AtomicBool::new(link_support.is_supported()),
        counters: Counters::new(),
        failures: Mutex::new(Vec::new()),
    };

    let mut file_actions = Vec::new();
    let mut delete_actions = Vec::new();
    for action in &plan.actions {
        match action {
            Action::CreateDir { path } => {
                if context.cancelled() {
                    return Err(EngineError::Cancelled);
                }
                create_dir(&context, path);
            }
            Action::SetMtime { path, mtime } => {
                apply_mtime(&context, path, *mtime);
            }
            Action::PullFile { .. } | Action::LinkOrCopy { .. } => file_actions.push(action),
            Action::Delete { .. } => delete_actions.push(action),
        }
    }

    run_file_phase(&context, &file_actions);

    for action in delete_actions {
        if context.cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Action::Delete { path, is_dir } = action {
            delete_entry(&context, path, *is_dir);
        }
    }

    if context.cancelled() {
        return Err(EngineError::Cancelled);
    }

    let failures = context.failures.into_inner().unwrap_or_default();
    Ok(ExecutionReport {
        files_pulled: context.counters.pulled.into_inner(),
        files_linked: context.counters.linked.into_inner(),
        files_copied: context.counters.copied.into_inner(),
        files_deleted: context.counters.deleted.into_inner(),
        dirs_created: context.counters.dirs.into_inner(),
        bytes_transferred: context.counters.bytes.into_inner(),
        failures,
    })
}

fn run_file_phase(context: &ExecContext<'_>, actions: &[&Action]) {
    if actions.is_empty() {
        return;
    }

    let workers = context.options.concurrency.min(actions.len().max(1));
    thread::scope(|scope| {
        let (sender, receiver) = bounded::<&Action>(workers * 2);

        for _ in 0..workers {
            let receiver = receiver.clone();
            scope.spawn(move || {
                while let Ok(action) = receiver.recv() {
                    if context.cancelled() {
                        continue; // drain without executing
                    }
                    match action {
                        Action::PullFile { path, size, mtime } => {
                            pull_file(context, path, *size, *mtime);
                        }
                        Action::LinkOrCopy { path, mtime, .. } => {
                            link_or_copy(context, path, *mtime);
                        }
                        _ => unreachable!("file phase only receives file actions"),
                    }
                }
            });
        }
        drop(receiver);

        for &action in actions {
            if context.cancelled() {
                break;
            }
            if sender.send(action).is_err() {
                break;
            }
        }
        drop(sender);
    });
}

fn create_dir(context: &ExecContext<'_>, path: &Path) {
    let dest = context.options.local_root.join(path);
    debug!(path = %dest.display(), "creating directory");
    // create_dir_all: a parent may legitimately be missing when it was
    // excluded but a negated child survived.
    match fs::create_dir_all(&dest) {
        Ok(()) => {
            context.counters.dirs.fetch_add(1, Ordering::Relaxed);
        }
        Err(source) => context.record_failure(path, ActionError::CreateDir { source }),
    }
}

fn apply_mtime(context: &ExecContext<'_>, path: &Path, mtime: i64) {
    let dest = context.options.local_root.join(path);
    if let Err(source) = filetime::set_file_mtime(&dest, FileTime::from_unix_time(mtime, 0)) {
        context.record_failure(path, ActionError::Mtime { source });
    }
}

fn pull_file(context: &ExecContext<'_>, path: &Path, size: u64, mtime: i64) {
    let dest = context.options.local_root.join(path);
    let remote = join_remote(context.options.remote_root.as_os_str(), path);

    let mut attempt = 0_usize;
    loop {
        let staging = staging_path(&dest);
        let mut guard = StagingGuard::new(staging.clone());

        match context.client.pull(&remote, &staging) {
            Ok(()) => {
                if let Err(source) = fs::rename(&staging, &dest) {
                    context.record_failure(path, ActionError::Rename { source });
                    return;
                }
                guard.disarm();
                // adb pull -a should have carried the timestamp already; set
                // it explicitly so implementations that do not are harmless.
                if let Err(source) =
                    filetime::set_file_mtime(&dest, FileTime::from_unix_time(mtime, 0))
                {
                    context.record_failure(path, ActionError::Mtime { source });
                    return;
                }
                context.counters.pulled.fetch_add(1, Ordering::Relaxed);
                context.counters.bytes.fetch_add(size, Ordering::Relaxed);
                info!(path = %path.display(), size, "pulled");
                return;
            }
            Err(error) => {
                drop(guard); // remove the partial staging file before retrying
                // Permanent faults (device answered with diagnostics) fail
                // fast; only transport-shaped failures earn the backoff.
                let retryable = error.is_transient();
                if retryable && attempt < BACKOFF.len() && !context.cancelled() {
                    warn!(
                        path = %path.display(),
                        attempt = attempt + 1,
                        %error,
                        "pull failed, retrying"
                    );
                    thread::sleep(BACKOFF[attempt]);
                    attempt += 1;
                    continue;
                }
                context.record_failure(path, ActionError::Pull(error));
                return;
            }
        }
    }
}

fn link_or_copy(context: &ExecContext<'_>, path: &Path, mtime: i64) {
    let reference_root = match &context.options.reference {
        Some(root) => root,
        None => {
            // The planner only emits reuse actions when a reference exists.
            debug_assert!(false, "LinkOrCopy without a reference snapshot");
            return;
        }
    };
    let source = reference_root.join(path);
    let dest = context.options.local_root.join(path);

    if context.link_ok.load(Ordering::Acquire) {
        let staging = staging_path(&dest);
        let mut guard = StagingGuard::new(staging.clone());
        match fs::hard_link(&source, &staging) {
            Ok(()) => match fs::rename(&staging, &dest) {
                Ok(()) => {
                    guard.disarm();
                    // The link shares the snapshot's inode; its mtime already
                    // matches the remote within the window, and touching it
                    // would rewrite the snapshot's timestamp too.
                    context.counters.linked.fetch_add(1, Ordering::Relaxed);
                    info!(path = %path.display(), "linked from reference");
                    return;
                }
                Err(source) => {
                    context.record_failure(path, ActionError::Rename { source });
                    return;
                }
            },
            Err(error) if link_unsupported(&error) => {
                warn!(%error, "hard links unavailable, copying for the rest of the run");
                context.link_ok.store(false, Ordering::Release);
            }
            Err(source) => {
                context.record_failure(path, ActionError::Link { source });
                return;
            }
        }
    }

    copy_from_reference(context, path, &source, &dest, mtime);
}

fn copy_from_reference(
    context: &ExecContext<'_>,
    path: &Path,
    source: &Path,
    dest: &Path,
    mtime: i64,
) {
    let staging = staging_path(dest);
    let mut guard = StagingGuard::new(staging.clone());
    if let Err(error) = fs::copy(source, &staging) {
        context.record_failure(path, ActionError::Copy { source: error });
        return;
    }
    if let Err(source) = fs::rename(&staging, dest) {
        context.record_failure(path, ActionError::Rename { source });
        return;
    }
    guard.disarm();
    if let Err(source) = filetime::set_file_mtime(dest, FileTime::from_unix_time(mtime, 0)) {
        context.record_failure(path, ActionError::Mtime { source });
        return;
    }
    context.counters.copied.fetch_add(1, Ordering::Relaxed);
    info!(path = %path.display(), "copied from reference");
}

fn delete_entry(context: &ExecContext<'_>, path: &Path, is_dir: bool) {
    let dest = context.options.local_root.join(path);
    let result = if is_dir {
        match fs::remove_dir(&dest) {
            // A directory that still has entries holds excluded files; it
            // stays, and that is not a failure.
            Err(_) if directory_not_empty(&dest) => {
                debug!(path = %dest.display(), "keeping non-empty directory");
                return;
            }
            other => other,
        }
    } else {
        match fs::remove_file(&dest) {
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    };

    match result {
        Ok(()) => {
            context.counters.deleted.fetch_add(1, Ordering::Relaxed);
            info!(path = %path.display(), "deleted");
        }
        Err(source) => context.record_failure(path, ActionError::Delete { source }),
    }
}

fn dry_run_report(plan: &Plan) -> ExecutionReport {
    let mut report = ExecutionReport::default();
    for action in &plan.actions {
        match action {
            Action::CreateDir { path } => {
                info!(path = %path.display(), "would create directory");
                report.dirs_created += 1;
            }
            Action::SetMtime { .. } => {}
            Action::PullFile { path, size, .. } => {
                info!(path = %path.display(), size, "would pull");
                report.files_pulled += 1;
                report.bytes_transferred += size;
            }
            Action::LinkOrCopy { path, .. } => {
                info!(path = %path.display(), "would link from reference");
                report.files_linked += 1;
            }
            Action::Delete { path, .. } => {
                info!(path = %path.display(), "would delete");
                report.files_deleted += 1;
            }
        }
    }
    report
}

fn directory_not_empty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// `.tmp-<random>-<basename>` beside the destination; the startup cleanup
/// contract depends on this prefix.
fn staging_path(dest: &Path) -> PathBuf {
    let token: u32 = random();
    let mut name = OsString::from(format!(".tmp-{token:08x}-"));
    name.push(dest.file_name().unwrap_or_default());
    dest.with_file_name(name)
}

fn link_unsupported(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::Unsupported
    ) {
        return true;
    }
    #[cfg(unix)]
    {
        // EXDEV, ENOSYS, EOPNOTSUPP
        if let Some(code) = error.raw_os_error() {
            return matches!(code, 18 | 38 | 95);
        }
    }
    false
}

struct StagingGuard {
    path: PathBuf,
    armed: bool,
}

impl StagingGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
