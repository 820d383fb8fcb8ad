#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! File records and inventories shared across the adbsync workspace.
//!
//! A scan of either side of a transfer (the device or the local target)
//! produces an [`Inventory`]: a sorted map from root-relative paths to
//! [`FileRecord`] values carrying the kind, size and modification time of
//! each entry. The reconciler walks inventories in path order, so the map is
//! backed by a [`BTreeMap`](std::collections::BTreeMap).

mod inventory;
mod record;

pub use inventory::Inventory;
pub use record::{FileKind, FileRecord};
