/// Classification of a scanned filesystem entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link. Never followed; recorded so the reconciler can skip it.
    Symlink,
    /// Anything else (sockets, devices, FIFOs).
    Other,
}

impl FileKind {
    /// Maps the one-letter type emitted by `find -printf '%y'`.
    ///
    /// `find` uses more letters than we distinguish (`b`, `c`, `p`, `s`, ...);
    /// everything that is not a regular file, directory or symlink collapses
    /// into [`FileKind::Other`].
    #[must_use]
    pub fn from_find_type(byte: u8) -> Self {
        match byte {
            b'f' => Self::File,
            b'd' => Self::Dir,
            b'l' => Self::Symlink,
            _ => Self::Other,
        }
    }

    /// Returns `true` for [`FileKind::File`].
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    /// Returns `true` for [`FileKind::Dir`].
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Dir)
    }
}

/// Size and modification time captured for one scanned entry.
///
/// `mtime` is whole seconds since the Unix epoch; fractional parts reported
/// by the device are truncated before the record is built so both sides of a
/// comparison share the same resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileRecord {
    kind: FileKind,
    size: u64,
    mtime: i64,
}

impl FileRecord {
    /// Creates a record from its parts.
    #[must_use]
    pub const fn new(kind: FileKind, size: u64, mtime: i64) -> Self {
        Self { kind, size, mtime }
    }

    /// Creates a regular-file record.
    #[must_use]
    pub const fn file(size: u64, mtime: i64) -> Self {
        Self::new(FileKind::File, size, mtime)
    }

    /// Creates a directory record. Directories carry no size.
    #[must_use]
    pub const fn dir(mtime: i64) -> Self {
        Self::new(FileKind::Dir, 0, mtime)
    }

    /// Creates a symlink record.
    #[must_use]
    pub const fn symlink(mtime: i64) -> Self {
        Self::new(FileKind::Symlink, 0, mtime)
    }

    /// Returns the entry kind.
    #[must_use]
    pub const fn kind(&self) -> FileKind {
        self.kind
    }

    /// Returns the size in bytes (zero for non-files).
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the modification time in whole seconds since the epoch.
    #[must_use]
    pub const fn mtime(&self) -> i64 {
        self.mtime
    }

    /// Compares two file records for transfer purposes.
    ///
    /// Records match when both are regular files of equal size whose mtimes
    /// differ by at most `modify_window` seconds. The window absorbs the
    /// coarse timestamp granularity of portable filesystems (exFAT rounds to
    /// 2 seconds).
    #[must_use]
    pub fn matches_within(&self, other: &Self, modify_window: i64) -> bool {
        self.kind.is_file()
            && other.kind.is_file()
            && self.size == other.size
            && (self.mtime - other.mtime).abs() <= modify_window
    }
}
