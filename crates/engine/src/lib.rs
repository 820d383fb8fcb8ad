#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Incremental pull engine.
//!
//! Given a remote inventory (one `find` round-trip over adb), the local
//! target inventory, and optionally the inventory of a previous snapshot,
//! the engine computes a [`Plan`] of per-path actions and executes it with a
//! bounded worker pool: changed files are pulled from the device into
//! staging files and renamed into place, unchanged files are hard-linked
//! from the snapshot (falling back to copy when the target filesystem
//! refuses links), stale entries are deleted, and every touched file ends up
//! with the remote modification time so the next run's comparison is stable.
//!
//! The top-level entry point is [`pull`].

mod error;
mod executor;
pub mod hardlink;
mod options;
mod plan;
mod sync;

pub use error::{ActionError, ActionFailure, EngineError};
pub use executor::ExecutionReport;
pub use hardlink::LinkSupport;
pub use options::PullOptions;
pub use plan::{plan, Action, Plan};
pub use sync::{pull, PullSummary};
