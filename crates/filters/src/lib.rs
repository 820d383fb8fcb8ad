#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Ordered exclude-pattern evaluation with gitignore semantics.
//!
//! An exclude file is a sequence of patterns applied in order with the last
//! matching pattern deciding the outcome. A pattern ending in `/` matches
//! directories only, a leading `!` negates (re-includes), `**` crosses path
//! segments while `*` does not, `#` starts a comment and blank lines are
//! ignored. Anchoring follows gitignore: a separator anywhere in the pattern
//! (other than a trailing one) pins it to the scan root, a bare name matches
//! at any depth. Each rule compiles to a single glob over the root-relative
//! namespace, which is always POSIX `/`-separated because it describes the
//! device-side tree; a path no rule names inherits the verdict of its
//! nearest ruled ancestor directory, so an excluded directory shadows
//! everything beneath it.
//!
//! Both scanners consult the same [`FilterSet`]; a directory that fails
//! [`FilterSet::allows`] is never descended into, so its contents neither
//! get pulled nor deleted.

mod rule;
mod set;

pub use rule::{FilterAction, FilterRule};
pub use set::{FilterError, FilterSet};
