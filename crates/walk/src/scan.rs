use std::path::Path;

use filters::FilterSet;
use flist::Inventory;
use tracing::warn;

use crate::error::WalkError;
use crate::walker::WalkBuilder;

/// Scans `root` into an [`Inventory`], applying `filters`.
///
/// The root entry itself is not recorded. Failures below the root are
/// collected and returned alongside the inventory; only a failure to inspect
/// the root aborts the scan. Entries that vanish between listing and stat
/// surface as collected errors, not records.
pub fn scan_local(
    root: &Path,
    filters: &FilterSet,
) -> Result<(Inventory, Vec<WalkError>), WalkError> {
    let walker = WalkBuilder::new(root)
        .include_root(false)
        .filters(filters.clone())
        .build()?;

    let mut inventory = Inventory::new();
    let mut errors = Vec::new();
    for item in walker {
        match item {
            Ok(entry) => {
                inventory.insert(entry.relative_path().to_path_buf(), entry.to_record());
            }
            Err(error) => {
                warn!(path = %error.path().display(), %error, "skipping unreadable entry");
                errors.push(error);
            }
        }
    }
    Ok((inventory, errors))
}
