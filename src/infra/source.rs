//! Read-only access to the source tree under analysis.
//!
//! The engine only ever lists and reads files. `FsSourceTree` is the real
//! backend; `MemorySourceTree` holds a virtual file set for tests and dry
//! runs.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::GlobSet;

use crate::infra::io::{check_text, read_file_smart};
use crate::infra::walk::{FileWalker, build_globset};

/// Include/exclude globs applied to relative paths
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl FileFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Same excludes, no include restriction
    pub fn excludes_only(&self) -> Self {
        Self {
            include: Vec::new(),
            exclude: self.exclude.clone(),
        }
    }

    fn compile(&self) -> io::Result<(GlobSet, GlobSet)> {
        let include = build_globset(&self.include).map_err(invalid_glob)?;
        let exclude = build_globset(&self.exclude).map_err(invalid_glob)?;
        Ok((include, exclude))
    }
}

fn invalid_glob(err: anyhow::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid glob: {err}"))
}

/// Read-only view of a workspace. Paths are relative to its root.
pub trait SourceTree: Send + Sync {
    /// Files accepted by `filter`, sorted by path
    fn list_files(&self, filter: &FileFilter) -> io::Result<Vec<PathBuf>>;

    /// Text content of one file; binary or non-UTF-8 files are errors
    fn read_text(&self, rel: &Path) -> io::Result<String>;
}

/// Source tree backed by the local filesystem
#[derive(Debug, Clone)]
pub struct FsSourceTree {
    root: PathBuf,
    include_hidden: bool,
}

impl FsSourceTree {
    /// Open `root`, which must be an accessible directory
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = dunce::canonicalize(root.as_ref())?;
        if !std::fs::metadata(&root)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            ));
        }
        // Fails early on permission problems
        std::fs::read_dir(&root)?;

        Ok(Self {
            root,
            include_hidden: false,
        })
    }

    pub fn with_include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walker(&self, filter: &FileFilter) -> Result<FileWalker> {
        Ok(FileWalker::new(&filter.exclude)?
            .with_includes(&filter.include)?
            .with_include_hidden(self.include_hidden))
    }
}

impl SourceTree for FsSourceTree {
    fn list_files(&self, filter: &FileFilter) -> io::Result<Vec<PathBuf>> {
        // Root may have vanished since open()
        std::fs::read_dir(&self.root)?;

        let walker = self.walker(filter).map_err(invalid_glob)?;
        Ok(walker.walk_files(&self.root))
    }

    fn read_text(&self, rel: &Path) -> io::Result<String> {
        Ok(read_file_smart(self.root.join(rel))?.into_string())
    }
}

/// In-memory source tree
#[derive(Debug, Clone, Default)]
pub struct MemorySourceTree {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemorySourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text file
    pub fn with_file(mut self, rel: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(rel.into(), content.into().into_bytes());
        self
    }

    /// Add a file with arbitrary bytes
    pub fn with_bytes(mut self, rel: impl Into<PathBuf>, content: Vec<u8>) -> Self {
        self.files.insert(rel.into(), content);
        self
    }
}

impl SourceTree for MemorySourceTree {
    fn list_files(&self, filter: &FileFilter) -> io::Result<Vec<PathBuf>> {
        let (include, exclude) = filter.compile()?;
        let has_includes = !filter.include.is_empty();

        // BTreeMap keys are already sorted
        Ok(self
            .files
            .keys()
            .filter(|p| !exclude.is_match(p) && (!has_includes || include.is_match(p)))
            .cloned()
            .collect())
    }

    fn read_text(&self, rel: &Path) -> io::Result<String> {
        let bytes = self.files.get(rel).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", rel.display()))
        })?;
        check_text(rel, bytes)?;
        String::from_utf8(bytes.clone()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not a UTF-8 text file", rel.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tree_filters() {
        let tree = MemorySourceTree::new()
            .with_file("src/a.rs", "a")
            .with_file("src/b.py", "b")
            .with_file("vendor/c.rs", "c");

        let filter = FileFilter::new(vec!["**/*.rs".into()], vec!["vendor/**".into()]);
        assert_eq!(tree.list_files(&filter).unwrap(), vec![PathBuf::from("src/a.rs")]);

        let all = tree.list_files(&FileFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_memory_tree_rejects_binary() {
        let tree = MemorySourceTree::new().with_bytes("img.png", vec![0x89, b'P', 0, 0]);
        let err = tree.read_text(Path::new("img.png")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_fs_tree_open_missing_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(FsSourceTree::open(tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_fs_tree_lists_relative_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/main.rs"), "fn main() {}\n").unwrap();

        let tree = FsSourceTree::open(tmp.path()).unwrap();
        let files = tree.list_files(&FileFilter::default()).unwrap();
        assert_eq!(files, vec![PathBuf::from("src/main.rs")]);
        assert_eq!(tree.read_text(&files[0]).unwrap(), "fn main() {}\n");
    }
}
