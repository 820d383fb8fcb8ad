#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Deterministic local filesystem traversal for adbsync.
//!
//! The walker enumerates a local subtree depth-first with directory entries
//! sorted lexicographically, so the produced sequence is stable across
//! platforms and filesystems. Symbolic links are never followed: they are
//! yielded as entries and the traversal moves on. Unlike a plain recursive
//! walk, failures to read a subtree are yielded per entry and the traversal
//! continues with the remaining siblings, matching the behaviour expected of
//! a backup target scan where files may vanish mid-run.
//!
//! [`scan_local`] builds an [`Inventory`] from a walk, applying a
//! [`FilterSet`] so excluded directories are pruned without descending into
//! them.

mod entry;
mod error;
mod scan;
mod walker;

pub use entry::WalkEntry;
pub use error::WalkError;
pub use scan::scan_local;
pub use walker::{WalkBuilder, Walker};
