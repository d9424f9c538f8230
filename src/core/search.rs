//! Keyword relevance search over the workspace.
//!
//! Scoring is raw substring counting: a line scores one point per distinct
//! keyword it contains, case-insensitively, with no word boundaries and no
//! stemming (`class` matches `classic`).

use std::io;
use std::path::Path;

use aho_corasick::{AhoCorasick, MatchKind};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::core::model::{CandidateLocation, Origin, rank_locations};
use crate::infra::io::surrounding_lines;
use crate::infra::source::{FileFilter, SourceTree};

/// Files scanned per search
pub const DEFAULT_MAX_FILES: usize = 50;

/// Candidates kept after ranking
pub const DEFAULT_MAX_RESULTS: usize = 20;

const CONTEXT_BEFORE: usize = 2;
const CONTEXT_AFTER: usize = 3;

/// Cost bounds for one search
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits
{
    pub max_files: usize,
    pub max_results: usize,
}

impl Default for SearchLimits
{
    fn default() -> Self
    {
        Self { max_files: DEFAULT_MAX_FILES, max_results: DEFAULT_MAX_RESULTS }
    }
}

/// Scans files for keyword hits and ranks lines
#[derive(Debug, Clone, Default)]
pub struct CodeSearchEngine
{
    limits: SearchLimits,
}

impl CodeSearchEngine
{
    pub fn new(limits: SearchLimits) -> Self
    {
        Self { limits }
    }

    /// Search `tree` for lines containing any keyword.
    ///
    /// Fails only when the file listing itself fails. Unreadable files are
    /// skipped. Files are scanned in parallel on the current rayon pool;
    /// results are concatenated in path order before ranking so output does
    /// not depend on scheduling.
    #[instrument(skip_all, fields(keywords = keywords.len()))]
    pub fn search(
        &self,
        keywords: &[String],
        tree: &dyn SourceTree,
        filter: &FileFilter,
    ) -> io::Result<Vec<CandidateLocation>>
    {
        let patterns: Vec<String> = keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| !k.is_empty())
            .unique()
            .collect();
        if patterns.is_empty()
        {
            return Ok(Vec::new());
        }

        // Overlapping search needs the standard match kind
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&patterns)
            .map_err(io::Error::other)?;

        let mut files = tree.list_files(filter)?;
        files.truncate(
            self.limits
                .max_files,
        );
        debug!(files = files.len(), "scanning");

        let per_file: Vec<Vec<CandidateLocation>> = files
            .par_iter()
            .map(|rel| scan_file(tree, rel, &matcher, patterns.len()))
            .collect();

        let hits = per_file
            .into_iter()
            .flatten()
            .collect();

        Ok(rank_locations(
            hits,
            self.limits
                .max_results,
        ))
    }
}

/// All keyword hits in one file, in line order
fn scan_file(
    tree: &dyn SourceTree,
    rel: &Path,
    matcher: &AhoCorasick,
    pattern_count: usize,
) -> Vec<CandidateLocation>
{
    let text = match tree.read_text(rel)
    {
        Ok(t) => t,
        Err(err) =>
        {
            debug!(file = %rel.display(), %err, "skipping unreadable file");
            return Vec::new();
        }
    };

    let lines: Vec<&str> = text
        .lines()
        .collect();
    let mut seen = vec![false; pattern_count];
    let mut out = Vec::new();

    for (idx, line) in lines
        .iter()
        .enumerate()
    {
        let score = distinct_hits(matcher, line, &mut seen);
        if score == 0
        {
            continue;
        }

        let (context_before, context_after) =
            surrounding_lines(&lines, idx, CONTEXT_BEFORE, CONTEXT_AFTER);
        out.push(CandidateLocation {
            file_path: rel.to_path_buf(),
            line_number: idx + 1,
            snippet: line
                .trim()
                .to_string(),
            relevance_score: score,
            context_before,
            context_after,
            origin: Origin::Keyword,
        });
    }

    out
}

/// Number of distinct keywords occurring in `line`
fn distinct_hits(
    matcher: &AhoCorasick,
    line: &str,
    seen: &mut [bool],
) -> u32
{
    seen.fill(false);
    let lowered = line.to_lowercase();
    let mut count = 0;

    for m in matcher.find_overlapping_iter(&lowered)
    {
        let id = m
            .pattern()
            .as_usize();
        if !seen[id]
        {
            seen[id] = true;
            count += 1;
        }
    }

    count
}
