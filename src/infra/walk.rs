//! Filepath: src/infra/walk.rs
//! Gitignore-aware file walker with include/exclude globs.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Exclude globs (early prune + late filter)
//! - Include globs (late filter; empty set means "everything")
//! - Optional hidden file policy
//! - Deterministic ordering for stable ranking
//!
//! Backed by ripgrep's `ignore` crate and `globset`.
//!
//! All glob matching is done on paths relative to the walk root.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// Gitignore-aware walker with extra exclude globs and optional includes.
/// Excludes are applied in two places:
///   1) Early: prune directories during traversal (filter_entry).
///   2) Late: filter out files that still slipped through.
pub struct FileWalker
{
    /// Compiled set of exclude patterns
    exclude: GlobSet,

    /// Compiled set of include patterns
    include: GlobSet,

    /// False when no include pattern was given (match everything)
    has_includes: bool,

    /// Include hidden (dot) files; default true
    include_hidden: bool,
}

/// Compile a list of glob strings into a set
pub fn build_globset(patterns: &[String]) -> Result<GlobSet>
{
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns
    {
        builder.add(Glob::new(pattern)?);
    }

    Ok(builder.build()?)
}

impl FileWalker
{
    /// Build a walker with exclude patterns (e.g., "target/**",
    /// "**/node_modules/**"). Patterns match on relative paths.
    pub fn new(excludes: &[String]) -> Result<Self>
    {
        Ok(Self {
            exclude: build_globset(excludes)?,
            include: GlobSet::empty(),
            has_includes: false,
            include_hidden: true,
        })
    }

    /// (Optional) Only keep files matching one of these globs.
    pub fn with_includes(
        mut self,
        includes: &[String],
    ) -> Result<Self>
    {
        self.include = build_globset(includes)?;
        self.has_includes = !includes.is_empty();
        Ok(self)
    }

    /// (Optional) Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) skips dotfiles
        b.hidden(!self.include_hidden);

        // Respect ignore files even outside a git checkout
        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);
        b.require_git(false);

        // Early directory pruning using relative paths
        let exclude = self
            .exclude
            .clone();
        let root_owned = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);
            if !is_dir || ent.depth() == 0
            {
                return true;
            }

            let rel = ent
                .path()
                .strip_prefix(&root_owned)
                .unwrap_or(ent.path());

            // Let "dir/**" prune "dir" itself
            !(exclude.is_match(rel) || exclude.is_match(rel.join("__faultline_child__")))
        });

        b
    }

    /// Traverse files under `root`, respecting ignore rules and globs.
    /// Returns a **sorted** list of paths relative to `root`.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<PathBuf> = walker
            // Unreadable entries are skipped
            .filter_map(|res| res.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(root_path)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .filter(|rel| self.accepts(rel))
            .collect();

        // Deterministic order
        out.sort();

        out
    }

    /// Late include/exclude check on a relative path
    pub fn accepts(
        &self,
        rel: &Path,
    ) -> bool
    {
        if self
            .exclude
            .is_match(rel)
        {
            return false;
        }
        !self.has_includes
            || self
                .include
                .is_match(rel)
    }
}
