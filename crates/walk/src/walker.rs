use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use filters::FilterSet;
use tracing::trace;

use crate::entry::WalkEntry;
use crate::error::WalkError;

/// Configures a [`Walker`].
#[derive(Debug)]
pub struct WalkBuilder {
    root: PathBuf,
    include_root: bool,
    filters: FilterSet,
}

impl WalkBuilder {
    /// Starts building a traversal rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_root: true,
            filters: FilterSet::default(),
        }
    }

    /// Controls whether the root entry itself is yielded (default: yes).
    #[must_use]
    pub fn include_root(mut self, include: bool) -> Self {
        self.include_root = include;
        self
    }

    /// Applies exclude rules to the traversal.
    ///
    /// Excluded entries are not yielded, and an excluded directory is never
    /// descended into.
    #[must_use]
    pub fn filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    /// Builds the walker, inspecting the root eagerly.
    pub fn build(self) -> Result<Walker, WalkError> {
        Walker::new(self.root, self.include_root, self.filters)
    }
}

/// Depth-first iterator over local filesystem entries.
///
/// Directory contents are yielded in lexicographic order. Failures below the
/// root are yielded as `Err` items and the walk continues with the remaining
/// siblings.
pub struct Walker {
    root: PathBuf,
    filters: FilterSet,
    yielded_root: bool,
    root_metadata: Option<fs::Metadata>,
    stack: Vec<DirectoryState>,
    pending_error: Option<WalkError>,
}

impl Walker {
    fn new(root: PathBuf, include_root: bool, filters: FilterSet) -> Result<Self, WalkError> {
        let root = absolutize(root);
        trace!(root = %root.display(), "starting local walk");

        let metadata = fs::symlink_metadata(&root).map_err(|source| WalkError::RootMetadata {
            path: root.clone(),
            source,
        })?;

        let mut walker = Self {
            root,
            filters,
            yielded_root: !include_root,
            root_metadata: Some(metadata),
            stack: Vec::new(),
            pending_error: None,
        };

        if walker
            .root_metadata
            .as_ref()
            .is_some_and(|metadata| metadata.file_type().is_dir())
        {
            walker.push_directory(walker.root.clone(), PathBuf::new(), 0);
        }

        Ok(walker)
    }

    /// Reads a directory and pushes its state; on failure the error is parked
    /// so the iterator yields it on the next step and then keeps going.
    fn push_directory(&mut self, fs_path: PathBuf, relative_prefix: PathBuf, depth: usize) {
        match DirectoryState::new(fs_path, relative_prefix, depth) {
            Ok(state) => self.stack.push(state),
            Err(error) => self.pending_error = Some(error),
        }
    }

    fn prepare_entry(
        &mut self,
        full_path: PathBuf,
        relative_path: PathBuf,
        depth: usize,
    ) -> Result<Option<WalkEntry>, WalkError> {
        let metadata =
            fs::symlink_metadata(&full_path).map_err(|source| WalkError::Metadata {
                path: full_path.clone(),
                source,
            })?;

        let is_dir = metadata.file_type().is_dir();
        if !self.filters.allows(&relative_path, is_dir) {
            trace!(path = %relative_path.display(), "excluded by filter");
            return Ok(None);
        }

        if is_dir {
            self.push_directory(full_path.clone(), relative_path.clone(), depth);
        }

        Ok(Some(WalkEntry {
            full_path,
            relative_path,
            metadata,
            depth,
            is_root: false,
        }))
    }
}

impl Iterator for Walker {
    type Item = Result<WalkEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.yielded_root {
            self.yielded_root = true;
            if let Some(metadata) = self.root_metadata.take() {
                return Some(Ok(WalkEntry {
                    full_path: self.root.clone(),
                    relative_path: PathBuf::new(),
                    metadata,
                    depth: 0,
                    is_root: true,
                }));
            }
        }

        loop {
            if let Some(error) = self.pending_error.take() {
                return Some(Err(error));
            }

            let (full_path, relative_path, depth) = {
                let state = self.stack.last_mut()?;

                if let Some(name) = state.next_name() {
                    let full_path = state.fs_path.join(&name);
                    let relative_path = if state.relative_prefix.as_os_str().is_empty() {
                        PathBuf::from(&name)
                    } else {
                        let mut rel = state.relative_prefix.clone();
                        rel.push(&name);
                        rel
                    };
                    (full_path, relative_path, state.depth + 1)
                } else {
                    self.stack.pop();
                    continue;
                }
            };

            match self.prepare_entry(full_path, relative_path, depth) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(error) => return Some(Err(error)),
            }
        }
    }
}

#[derive(Debug)]
struct DirectoryState {
    fs_path: PathBuf,
    relative_prefix: PathBuf,
    entries: Vec<OsString>,
    index: usize,
    depth: usize,
}

impl DirectoryState {
    fn new(fs_path: PathBuf, relative_prefix: PathBuf, depth: usize) -> Result<Self, WalkError> {
        let read_dir = fs::read_dir(&fs_path).map_err(|source| WalkError::ReadDir {
            path: fs_path.clone(),
            source,
        })?;
        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| WalkError::ReadDir {
                path: fs_path.clone(),
                source,
            })?;
            entries.push(entry.file_name());
        }
        entries.sort();

        Ok(Self {
            fs_path,
            relative_prefix,
            entries,
            index: 0,
            depth,
        })
    }

    fn next_name(&mut self) -> Option<OsString> {
        let name = self.entries.get(self.index)?;
        self.index += 1;
        Some(name.clone())
    }
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        env::current_dir().map_or(path.clone(), |cwd| cwd.join(path))
    }
}
