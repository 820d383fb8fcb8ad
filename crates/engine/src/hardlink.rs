//! Runtime detection of hard-link support between two directories.
//!
//! Snapshot reuse only pays off when the reference snapshot and the new
//! target sit on one filesystem that supports links (FAT-family targets on
//! portable drives do not). The probe runs once per pull; the executor
//! additionally latches onto copy mode the first time a real link fails, so
//! a probe false-positive costs at most one fallback.

use std::fs;
use std::io;
use std::path::Path;

use rand::random;
use tracing::debug;

/// Outcome of [`probe`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkSupport {
    /// Hard links between the two roots work.
    Supported,
    /// Links are unavailable; reuse degrades to byte copies.
    Unsupported,
}

impl LinkSupport {
    /// Returns `true` when links work.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Supported)
    }
}

/// Checks whether `local_root` can hard-link files out of `reference_root`.
///
/// Roots on different filesystems report [`LinkSupport::Unsupported`]
/// without attempting a link. Otherwise a zero-byte probe file is created in
/// the reference root, linked into the local root, verified via its link
/// count and removed again; any failure along the way means "unsupported"
/// rather than an error, since copy mode is always a valid answer.
#[must_use]
pub fn probe(reference_root: &Path, local_root: &Path) -> LinkSupport {
    if !same_filesystem(reference_root, local_root) {
        debug!("reference and target are on different filesystems");
        return LinkSupport::Unsupported;
    }

    let token: u32 = random();
    let source = reference_root.join(format!(".adbsync-probe-{token:08x}"));
    let target = local_root.join(format!(".adbsync-probe-{token:08x}"));
    let support = try_probe(&source, &target).unwrap_or(LinkSupport::Unsupported);
    let _ = fs::remove_file(&target);
    let _ = fs::remove_file(&source);
    debug!(?support, "hard link probe finished");
    support
}

fn try_probe(source: &Path, target: &Path) -> io::Result<LinkSupport> {
    fs::File::create(source)?;
    fs::hard_link(source, target)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if fs::metadata(target)?.nlink() < 2 {
            return Ok(LinkSupport::Unsupported);
        }
    }

    Ok(LinkSupport::Supported)
}

#[cfg(unix)]
fn same_filesystem(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(meta_a), Ok(meta_b)) => meta_a.dev() == meta_b.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_filesystem(_a: &Path, _b: &Path) -> bool {
    // Without device ids the link attempt itself is the probe.
    true
}
