use std::path::PathBuf;

use tracing::{debug, warn};

use flist::{FileKind, Inventory};

use crate::options::PullOptions;

/// One step of a pull plan, keyed by root-relative path.
///
/// The executor resolves relative paths against the configured roots: pull
/// sources against the remote root, link sources against the reference
/// snapshot, everything else against the local root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Create a directory (parents are created by plan order).
    CreateDir {
        /// Root-relative directory path.
        path: PathBuf,
    },
    /// Apply a modification time; emitted for newly created directories.
    SetMtime {
        /// Root-relative path.
        path: PathBuf,
        /// Seconds since the epoch.
        mtime: i64,
    },
    /// Transfer a file from the device.
    PullFile {
        /// Root-relative file path.
        path: PathBuf,
        /// Expected size in bytes.
        size: u64,
        /// Remote modification time, applied after the transfer.
        mtime: i64,
    },
    /// Reuse an unchanged file from the reference snapshot.
    LinkOrCopy {
        /// Root-relative file path.
        path: PathBuf,
        /// Expected size in bytes.
        size: u64,
        /// Modification time applied when the fallback copy is taken.
        mtime: i64,
    },
    /// Remove a stale local entry (single-version mode only).
    Delete {
        /// Root-relative path.
        path: PathBuf,
        /// Whether the entry is a directory.
        is_dir: bool,
    },
}

impl Action {
    /// Root-relative path this action targets.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            Action::CreateDir { path }
            | Action::SetMtime { path, .. }
            | Action::PullFile { path, .. }
            | Action::LinkOrCopy { path, .. }
            | Action::Delete { path, .. } => path,
        }
    }
}

/// Ordered action list produced by [`plan`].
///
/// Directory actions appear before anything beneath them (the remote
/// inventory iterates in sorted path order) and deletions come last in
/// reverse-depth order, so executing front to back is always safe.
#[derive(Debug, Default)]
pub struct Plan {
    /// Actions in execution order.
    pub actions: Vec<Action>,
    /// Remote files skipped because they are symlinks or special files.
    pub skipped_special: u64,
    /// Remote files whose local counterpart already matches.
    pub unchanged: u64,
}

impl Plan {
    /// Total bytes the device will have to send.
    #[must_use]
    pub fn bytes_to_pull(&self) -> u64 {
        self.actions
            .iter()
            .map(|action| match action {
                Action::PullFile { size, .. } => *size,
                _ => 0,
            })
            .sum()
    }

    /// Number of actions of each transfer-relevant kind: `(pulls, links,
    /// creates, deletes)`.
    #[must_use]
    pub fn counts(&self) -> (u64, u64, u64, u64) {
        let mut pulls = 0;
        let mut links = 0;
        let mut creates = 0;
        let mut deletes = 0;
        for action in &self.actions {
            match action {
                Action::PullFile { .. } => pulls += 1,
                Action::LinkOrCopy { .. } => links += 1,
                Action::CreateDir { .. } => creates += 1,
                Action::Delete { .. } => deletes += 1,
                Action::SetMtime { .. } => {}
            }
        }
        (pulls, links, creates, deletes)
    }
}

/// Diffs the remote inventory against the local target (and optional
/// reference snapshot) into an executable [`Plan`].
///
/// Both inventories are already filtered by the scanners, so excluded paths
/// can neither be pulled nor deleted here.
#[must_use]
pub fn plan(
    remote: &Inventory,
    local: &Inventory,
    reference: Option<&Inventory>,
    options: &PullOptions,
) -> Plan {
    let window = options.modify_window;
    let mut plan = Plan::default();

    for (path, record) in remote {
        match record.kind() {
            FileKind::Dir => {
                match local.get(path) {
                    Some(existing) if existing.kind().is_dir() => {}
                    Some(existing) => {
                        // A non-directory squats on the path; mirroring would
                        // destroy local data the remote never claimed.
                        warn!(
                            path = %path.display(),
                            kind = ?existing.kind(),
                            "local entry blocks remote directory, skipping"
                        );
                        plan.skipped_special += 1;
                    }
                    None => {
                        plan.actions.push(Action::CreateDir { path: path.clone() });
                        plan.actions.push(Action::SetMtime {
                            path: path.clone(),
                            mtime: record.mtime(),
                        });
                    }
                }
            }
            FileKind::File => match local.get(path) {
                Some(existing) if existing.matches_within(record, window) => {
                    plan.unchanged += 1;
                }
                Some(existing) if !existing.kind().is_file() => {
                    warn!(
                        path = %path.display(),
                        kind = ?existing.kind(),
                        "local entry is not a regular file, skipping"
                    );
                    plan.skipped_special += 1;
                }
                _ => {
                    let reference_hit = reference
                        .and_then(|snapshot| snapshot.get(path))
                        .is_some_and(|previous| previous.matches_within(record, window));
                    if reference_hit {
                        plan.actions.push(Action::LinkOrCopy {
                            path: path.clone(),
                            size: record.size(),
                            mtime: record.mtime(),
                        });
                    } else {
                        plan.actions.push(Action::PullFile {
                            path: path.clone(),
                            size: record.size(),
                            mtime: record.mtime(),
                        });
                    }
                }
            },
            FileKind::Symlink | FileKind::Other => {
                warn!(path = %path.display(), kind = ?record.kind(), "skipping non-regular remote entry");
                plan.skipped_special += 1;
            }
        }
    }

    if options.delete_extraneous {
        // Reverse path order puts every child ahead of its parent directory,
        // so directories are empty by the time their turn comes.
        for (path, record) in local.iter().rev() {
            if !remote.contains(path) {
                plan.actions.push(Action::Delete {
                    path: path.clone(),
                    is_dir: record.kind().is_dir(),
                });
            }
        }
    }

    let (pulls, links, creates, deletes) = plan.counts();
    debug!(
        pulls,
        links,
        creates,
        deletes,
        unchanged = plan.unchanged,
        skipped = plan.skipped_special,
        "plan computed"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use flist::FileRecord;
    use std::path::Path;

    fn options() -> PullOptions {
        PullOptions::new("/sdcard/DCIM", "/tmp/out")
    }

    fn inventory(entries: &[(&str, FileRecord)]) -> Inventory {
        entries
            .iter()
            .map(|(path, record)| (PathBuf::from(path), *record))
            .collect()
    }

    #[test]
    fn empty_remote_empty_local_is_a_noop() {
        let plan = plan(
            &Inventory::new(),
            &Inventory::new(),
            None,
            &options(),
        );
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn new_directory_is_created_with_mtime() {
        let remote = inventory(&[("a", FileRecord::dir(1_700_000_000))]);
        let plan = plan(&remote, &Inventory::new(), None, &options());
        assert_eq!(
            plan.actions,
            [
                Action::CreateDir {
                    path: PathBuf::from("a")
                },
                Action::SetMtime {
                    path: PathBuf::from("a"),
                    mtime: 1_700_000_000
                },
            ]
        );
    }

    #[test]
    fn unchanged_file_produces_nothing() {
        let remote = inventory(&[
            ("x.jpg", FileRecord::file(1000, 1_700_000_000)),
            ("y.jpg", FileRecord::file(2500, 1_700_000_500)),
        ]);
        let local = inventory(&[
            ("x.jpg", FileRecord::file(1000, 1_700_000_000)),
            ("y.jpg", FileRecord::file(2000, 1_700_000_100)),
        ]);
        let plan = plan(&remote, &local, None, &options());
        assert_eq!(
            plan.actions,
            [Action::PullFile {
                path: PathBuf::from("y.jpg"),
                size: 2500,
                mtime: 1_700_000_500
            }]
        );
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn mtime_within_window_counts_as_unchanged() {
        let remote = inventory(&[("a", FileRecord::file(10, 1_700_000_002))]);
        let local = inventory(&[("a", FileRecord::file(10, 1_700_000_000))]);
        let plan_wide = plan(&remote, &local, None, &options());
        assert!(plan_wide.actions.is_empty());

        let mut narrow = options();
        narrow.modify_window = 1;
        let plan_narrow = plan(&remote, &local, None, &narrow);
        assert_eq!(plan_narrow.actions.len(), 1);
    }

    #[test]
    fn reference_match_becomes_link() {
        let remote = inventory(&[("photo.jpg", FileRecord::file(5_000_000, 1_700_000_000))]);
        let reference = inventory(&[("photo.jpg", FileRecord::file(5_000_000, 1_700_000_000))]);
        let plan = plan(&remote, &Inventory::new(), Some(&reference), &options());
        assert_eq!(
            plan.actions,
            [Action::LinkOrCopy {
                path: PathBuf::from("photo.jpg"),
                size: 5_000_000,
                mtime: 1_700_000_000
            }]
        );
    }

    #[test]
    fn stale_reference_is_pulled_instead() {
        let remote = inventory(&[("photo.jpg", FileRecord::file(5_000_000, 1_700_000_900))]);
        let reference = inventory(&[("photo.jpg", FileRecord::file(5_000_000, 1_700_000_000))]);
        let plan = plan(&remote, &Inventory::new(), Some(&reference), &options());
        assert!(matches!(plan.actions[0], Action::PullFile { .. }));
    }

    #[test]
    fn matching_local_file_beats_reference() {
        let remote = inventory(&[("a", FileRecord::file(10, 1_700_000_000))]);
        let local = inventory(&[("a", FileRecord::file(10, 1_700_000_000))]);
        let reference = inventory(&[("a", FileRecord::file(10, 1_700_000_000))]);
        let plan = plan(&remote, &local, Some(&reference), &options());
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn extraneous_entries_delete_children_first() {
        let remote = inventory(&[("keep.txt", FileRecord::file(1, 1))]);
        let local = inventory(&[
            ("keep.txt", FileRecord::file(1, 1)),
            ("old", FileRecord::dir(1)),
            ("old/nested.txt", FileRecord::file(2, 1)),
        ]);
        let plan = plan(&remote, &local, None, &options());
        assert_eq!(
            plan.actions,
            [
                Action::Delete {
                    path: PathBuf::from("old/nested.txt"),
                    is_dir: false
                },
                Action::Delete {
                    path: PathBuf::from("old"),
                    is_dir: true
                },
            ]
        );
    }

    #[test]
    fn no_delete_without_flag() {
        let local = inventory(&[("old.txt", FileRecord::file(1, 1))]);
        let mut opts = options();
        opts.delete_extraneous = false;
        let plan = plan(&Inventory::new(), &local, None, &opts);
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn remote_symlinks_are_skipped_with_count() {
        let remote = inventory(&[("link", FileRecord::symlink(1))]);
        let plan = plan(&remote, &Inventory::new(), None, &options());
        assert!(plan.actions.is_empty());
        assert_eq!(plan.skipped_special, 1);
    }

    #[test]
    fn local_symlink_is_never_overwritten() {
        let remote = inventory(&[("entry", FileRecord::file(10, 5))]);
        let local = inventory(&[("entry", FileRecord::symlink(5))]);
        let plan = plan(&remote, &local, None, &options());
        assert!(plan.actions.is_empty());
        assert_eq!(plan.skipped_special, 1);
    }

    #[test]
    fn newer_local_file_is_still_overwritten() {
        // Mirror semantics: local edits lose.
        let remote = inventory(&[("doc.txt", FileRecord::file(10, 1_700_000_000))]);
        let local = inventory(&[("doc.txt", FileRecord::file(12, 1_700_099_999))]);
        let plan = plan(&remote, &local, None, &options());
        assert!(matches!(plan.actions[0], Action::PullFile { .. }));
    }

    #[test]
    fn bytes_to_pull_ignores_links() {
        let remote = inventory(&[
            ("a", FileRecord::file(100, 0)),
            ("b", FileRecord::file(50, 0)),
        ]);
        let reference = inventory(&[("b", FileRecord::file(50, 0))]);
        let plan = plan(&remote, &Inventory::new(), Some(&reference), &options());
        assert_eq!(plan.bytes_to_pull(), 100);
    }

    #[test]
    fn existing_directory_is_left_alone() {
        let remote = inventory(&[("a", FileRecord::dir(9))]);
        let local = inventory(&[("a", FileRecord::dir(2))]);
        let plan = plan(&remote, &local, None, &options());
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn sorted_remote_creates_parents_before_children() {
        let remote = inventory(&[
            ("a", FileRecord::dir(1)),
            ("a/b", FileRecord::dir(1)),
            ("a/b/c.txt", FileRecord::file(1, 1)),
        ]);
        let plan = plan(&remote, &Inventory::new(), None, &options());
        let paths: Vec<_> = plan.actions.iter().map(|a| a.path().clone()).collect();
        let dir_a = paths.iter().position(|p| p == Path::new("a")).unwrap();
        let dir_b = paths.iter().position(|p| p == Path::new("a/b")).unwrap();
        let file = paths
            .iter()
            .position(|p| p == Path::new("a/b/c.txt"))
            .unwrap();
        assert!(dir_a < dir_b && dir_b < file);
    }
}
