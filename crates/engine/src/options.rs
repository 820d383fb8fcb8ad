use std::path::PathBuf;
use std::time::Duration;

use filters::FilterSet;

/// Default worker-pool width.
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Default mtime comparison window in seconds.
///
/// Two seconds absorbs exFAT's rounding on portable drives; tighten to one
/// for targets with full-second resolution.
pub const DEFAULT_MODIFY_WINDOW: i64 = 2;

/// Configuration for one [`pull`](crate::pull) run.
#[derive(Clone, Debug)]
pub struct PullOptions {
    /// Absolute POSIX path of the tree on the device.
    pub remote_root: PathBuf,
    /// Local directory receiving the mirror; created if absent.
    pub local_root: PathBuf,
    /// Previous snapshot consulted for hard-link reuse. Read-only.
    pub reference: Option<PathBuf>,
    /// Exclude rules applied to both sides.
    pub filters: FilterSet,
    /// Remove local entries that are missing remotely.
    pub delete_extraneous: bool,
    /// Worker-pool width for file actions, at least 1.
    pub concurrency: usize,
    /// Tolerated mtime difference in seconds when comparing records.
    pub modify_window: i64,
    /// Plan and report without touching the filesystem or the device.
    pub dry_run: bool,
    /// Per-call timeout for `adb shell`.
    pub shell_timeout: Duration,
    /// Per-call timeout for `adb pull`.
    pub pull_timeout: Duration,
}

impl PullOptions {
    /// Creates options for mirroring `remote_root` into `local_root` with
    /// single-version defaults: extraneous deletion on, no reference.
    #[must_use]
    pub fn new(remote_root: impl Into<PathBuf>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_root: remote_root.into(),
            local_root: local_root.into(),
            reference: None,
            filters: FilterSet::default(),
            delete_extraneous: true,
            concurrency: DEFAULT_CONCURRENCY,
            modify_window: DEFAULT_MODIFY_WINDOW,
            dry_run: false,
            shell_timeout: adb::DEFAULT_SHELL_TIMEOUT,
            pull_timeout: adb::DEFAULT_PULL_TIMEOUT,
        }
    }

    /// Sets the reference snapshot and switches deletion off (multi-version
    /// snapshots accumulate; stale entries simply stay absent from the new
    /// snapshot).
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<PathBuf>) -> Self {
        self.reference = Some(reference.into());
        self.delete_extraneous = false;
        self
    }

    /// Sets the exclude rules.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), crate::EngineError> {
        use crate::EngineError;

        if !self.remote_root.to_string_lossy().starts_with('/') {
            return Err(EngineError::Config(format!(
                "remote root must be an absolute POSIX path: {:?}",
                self.remote_root
            )));
        }
        if self.concurrency == 0 {
            return Err(EngineError::Config("concurrency must be at least 1".into()));
        }
        if self.modify_window < 0 {
            return Err(EngineError::Config(
                "modify window must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
