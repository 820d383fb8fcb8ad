use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;

use crate::rule::{FilterAction, FilterRule};

/// Error produced while building a [`FilterSet`].
#[derive(Debug, Error)]
pub enum FilterError {
    /// A pattern did not compile into a glob matcher.
    #[error("failed to compile exclude pattern '{pattern}': {source}")]
    Pattern {
        /// The offending pattern text.
        pattern: String,
        /// Underlying glob error.
        source: globset::Error,
    },
    /// An exclude file could not be read.
    #[error("failed to read exclude file {path:?}: {source}")]
    Io {
        /// The exclude file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Ordered, compiled collection of exclude rules.
///
/// Cheap to clone; the compiled matchers are shared behind an [`Arc`] so the
/// same set can be handed to both scanners and the reconciler.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    inner: Arc<FilterSetInner>,
}

impl FilterSet {
    /// Builds a [`FilterSet`] from already-parsed rules.
    pub fn from_rules<I>(rules: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = FilterRule>,
    {
        let compiled = rules
            .into_iter()
            .map(|rule| CompiledRule::compile(&rule))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            inner: Arc::new(FilterSetInner { rules: compiled }),
        })
    }

    /// Parses gitignore-style text, one pattern per line.
    pub fn from_lines<'a, I>(lines: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_rules(lines.into_iter().filter_map(FilterRule::parse_line))
    }

    /// Reads and parses an exclude file (UTF-8, `#` comments, blank lines
    /// ignored).
    pub fn from_file(path: &Path) -> Result<Self, FilterError> {
        let text = fs::read_to_string(path).map_err(|source| FilterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_lines(text.lines())
    }

    /// Reports whether the set contains any rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.rules.is_empty()
    }

    /// Determines whether `path` survives the rules.
    ///
    /// `is_dir` selects directory-only rule applicability. The path itself is
    /// judged first (rules apply in order, last match wins); when no rule
    /// names it, the verdict of its nearest ruled ancestor directory applies,
    /// so an excluded directory shadows everything beneath it without every
    /// rule having to enumerate descendants.
    #[must_use]
    pub fn allows(&self, path: &Path, is_dir: bool) -> bool {
        if let Some(action) = self.inner.verdict(path, is_dir) {
            return matches!(action, FilterAction::Include);
        }

        let mut ancestor = path.parent();
        while let Some(prefix) = ancestor {
            if prefix.as_os_str().is_empty() {
                break;
            }
            if let Some(action) = self.inner.verdict(prefix, true) {
                return matches!(action, FilterAction::Include);
            }
            ancestor = prefix.parent();
        }
        true
    }
}

#[derive(Debug, Default)]
struct FilterSetInner {
    rules: Vec<CompiledRule>,
}

impl FilterSetInner {
    /// Last matching rule's action for exactly this path, if any rule names
    /// it.
    fn verdict(&self, path: &Path, is_dir: bool) -> Option<FilterAction> {
        self.rules
            .iter()
            .filter(|rule| rule.hits(path, is_dir))
            .last()
            .map(|rule| rule.action)
    }
}

/// One rule reduced to a single glob over the root-relative namespace.
///
/// Exclude files describe the device-side tree, which is always POSIX with
/// `/` separators, so normalisation never has to consider platform
/// separators. Gitignore anchoring applies: a separator anywhere in the
/// pattern (other than a trailing one) pins it to the scan root, while a
/// bare name floats to any depth via a `**/` prefix.
#[derive(Debug)]
struct CompiledRule {
    action: FilterAction,
    directory_only: bool,
    matcher: GlobMatcher,
}

impl CompiledRule {
    fn compile(rule: &FilterRule) -> Result<Self, FilterError> {
        let text = rule.pattern();
        let directory_only = text.ends_with('/');
        let trimmed = text.strip_suffix('/').unwrap_or(text);
        let (body, rooted) = match trimmed.strip_prefix('/') {
            Some(rest) => (rest, true),
            None => (trimmed, trimmed.contains('/')),
        };
        let glob_text: Cow<'_, str> = if rooted {
            Cow::Borrowed(body)
        } else {
            Cow::Owned(format!("**/{body}"))
        };

        let glob = GlobBuilder::new(&glob_text)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|source| FilterError::Pattern {
                pattern: text.to_string(),
                source,
            })?;

        Ok(Self {
            action: rule.action(),
            directory_only,
            matcher: glob.compile_matcher(),
        })
    }

    fn hits(&self, path: &Path, is_dir: bool) -> bool {
        (is_dir || !self.directory_only) && self.matcher.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(lines: &[&str]) -> FilterSet {
        FilterSet::from_lines(lines.iter().copied()).expect("filters compile")
    }

    #[test]
    fn empty_set_allows_everything() {
        let filters = FilterSet::default();
        assert!(filters.is_empty());
        assert!(filters.allows(Path::new("DCIM/IMG_1.jpg"), false));
    }

    #[test]
    fn exclude_matches_at_any_depth() {
        let filters = set(&["*.tmp"]);
        assert!(!filters.allows(Path::new("note.tmp"), false));
        assert!(!filters.allows(Path::new("a/b/note.tmp"), false));
        assert!(filters.allows(Path::new("note.txt"), false));
    }

    #[test]
    fn star_does_not_cross_separators() {
        let filters = set(&["IMG_*.jpg"]);
        assert!(!filters.allows(Path::new("DCIM/IMG_1.jpg"), false));
        let filters = set(&["/DCIM/*.jpg"]);
        assert!(!filters.allows(Path::new("DCIM/a.jpg"), false));
        assert!(filters.allows(Path::new("DCIM/sub/a.jpg"), false));
    }

    #[test]
    fn double_star_crosses_segments() {
        let filters = set(&["/cache/**/index"]);
        assert!(!filters.allows(Path::new("cache/a/b/index"), false));
    }

    #[test]
    fn anchored_pattern_only_matches_at_root() {
        let filters = set(&["/Download"]);
        assert!(!filters.allows(Path::new("Download"), true));
        assert!(filters.allows(Path::new("backup/Download"), true));
    }

    #[test]
    fn inner_separator_anchors_like_gitignore() {
        let filters = set(&["DCIM/cache"]);
        assert!(!filters.allows(Path::new("DCIM/cache"), true));
        assert!(filters.allows(Path::new("backup/DCIM/cache"), true));
    }

    #[test]
    fn directory_rule_excludes_contents() {
        let filters = set(&[".thumbnails/"]);
        assert!(!filters.allows(Path::new("DCIM/.thumbnails"), true));
        assert!(!filters.allows(Path::new("DCIM/.thumbnails/a.bin"), false));
        assert!(filters.allows(Path::new("DCIM/IMG_1.jpg"), false));
    }

    #[test]
    fn plain_exclude_shadows_descendants_too() {
        let filters = set(&["cache"]);
        assert!(!filters.allows(Path::new("a/cache"), true));
        assert!(!filters.allows(Path::new("a/cache/deep/blob.bin"), false));
    }

    #[test]
    fn directory_rule_ignores_plain_files() {
        let filters = set(&["build/"]);
        assert!(filters.allows(Path::new("build"), false));
        assert!(!filters.allows(Path::new("build"), true));
    }

    #[test]
    fn later_negation_wins() {
        let filters = set(&["*.log", "!important.log"]);
        assert!(filters.allows(Path::new("logs/important.log"), false));
        assert!(!filters.allows(Path::new("logs/other.log"), false));
    }

    #[test]
    fn negation_order_matters() {
        let filters = set(&["!important.log", "*.log"]);
        assert!(!filters.allows(Path::new("important.log"), false));
    }

    #[test]
    fn nearest_ruled_ancestor_decides() {
        let filters = set(&["!top/", "top/sub/"]);
        assert!(filters.allows(Path::new("top/other.txt"), false));
        assert!(!filters.allows(Path::new("top/sub/file.txt"), false));
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let filters = set(&["# media junk", "", "*.tmp"]);
        assert!(!filters.allows(Path::new("x.tmp"), false));
        assert!(filters.allows(Path::new("# media junk"), false));
    }

    #[test]
    fn from_file_reads_patterns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("exclude.txt");
        fs::write(&file, "# junk\n.thumbnails/\n*.tmp\n!keep.tmp\n").expect("write");
        let filters = FilterSet::from_file(&file).expect("parse");
        assert!(!filters.allows(Path::new("a/.thumbnails/x"), false));
        assert!(!filters.allows(Path::new("a.tmp"), false));
        assert!(filters.allows(Path::new("keep.tmp"), false));
    }

    #[test]
    fn from_file_missing_reports_io_error() {
        let err = FilterSet::from_file(Path::new("/nonexistent/exclude.txt"))
            .expect_err("missing file");
        assert!(matches!(err, FilterError::Io { .. }));
    }

    #[test]
    fn invalid_pattern_reports_original_text() {
        let err = FilterSet::from_lines(["["]).expect_err("invalid glob");
        match err {
            FilterError::Pattern { pattern, .. } => assert_eq!(pattern, "["),
            other => panic!("unexpected error: {other}"),
        }
    }
}
