//! Stack frame resolution
//!
//! Maps parsed frames onto workspace files by base name and pulls the code
//! around the failing line. Resolved frames carry a fixed score of 10, at
//! least the best possible keyword score, and are merged ahead of keyword
//! hits.
//!
//! When several files share a base name the first one in path order wins;
//! package or namespace information is not used to disambiguate.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::core::model::{CandidateLocation, Origin, StackFrame};
use crate::infra::io::surrounding_lines;
use crate::infra::source::{FileFilter, SourceTree};

/// Fixed relevance of a resolved frame
pub const FRAME_SCORE: u32 = 10;

/// Lines of context on each side of a resolved frame
const FRAME_CONTEXT: usize = 5;

/// Resolves frames against a source tree
pub struct StackFrameResolver;

impl StackFrameResolver
{
    /// One candidate per resolvable frame, in frame order.
    ///
    /// `filter` supplies the exclude globs; include globs are ignored so a
    /// frame can land in any file type. Frames whose file is missing or whose
    /// line is out of range are dropped.
    #[instrument(skip_all, fields(frames = frames.len()))]
    pub fn resolve(
        frames: &[StackFrame],
        tree: &dyn SourceTree,
        filter: &FileFilter,
    ) -> io::Result<Vec<CandidateLocation>>
    {
        if frames.is_empty()
        {
            return Ok(Vec::new());
        }

        let index = index_by_base_name(tree.list_files(&filter.excludes_only())?);
        let mut out = Vec::new();

        for frame in frames
        {
            let Some(rel) = index.get(frame.file_name.as_str())
            else
            {
                debug!(file = %frame.file_name, "frame file not in workspace");
                continue;
            };

            let text = match tree.read_text(rel)
            {
                Ok(t) => t,
                Err(err) =>
                {
                    debug!(file = %rel.display(), %err, "frame file unreadable");
                    continue;
                }
            };

            let lines: Vec<&str> = text
                .lines()
                .collect();
            if frame.line_number == 0 || frame.line_number > lines.len()
            {
                debug!(
                    file = %rel.display(),
                    line = frame.line_number,
                    len = lines.len(),
                    "frame line out of range"
                );
                continue;
            }

            let idx = frame.line_number - 1;
            let (context_before, context_after) =
                surrounding_lines(&lines, idx, FRAME_CONTEXT, FRAME_CONTEXT);

            out.push(CandidateLocation {
                file_path: rel.clone(),
                line_number: frame.line_number,
                snippet: lines[idx]
                    .trim()
                    .to_string(),
                relevance_score: FRAME_SCORE,
                context_before,
                context_after,
                origin: Origin::StackFrame,
            });
        }

        Ok(out)
    }
}

/// Base name -> first path carrying it (input is sorted)
fn index_by_base_name(files: Vec<PathBuf>) -> HashMap<String, PathBuf>
{
    let mut index = HashMap::new();

    for path in files
    {
        if let Some(name) = path
            .file_name()
            .and_then(OsStr::to_str)
        {
            index
                .entry(name.to_string())
                .or_insert(path);
        }
    }

    index
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::infra::source::MemorySourceTree;

    fn frame(
        file: &str,
        line: usize,
    ) -> StackFrame
    {
        StackFrame {
            file_name: file.to_string(),
            line_number: line,
            function_name: "f".to_string(),
            class_name: None,
        }
    }

    fn numbered(n: usize) -> String
    {
        (1..=n)
            .map(|i| format!("line {i}\n"))
            .collect()
    }

    #[test]
    fn test_resolves_with_wide_context()
    {
        let tree = MemorySourceTree::new().with_file("src/main/java/com/acme/Auth.java", numbered(20));

        let hits =
            StackFrameResolver::resolve(&[frame("Auth.java", 10)], &tree, &FileFilter::default())
                .unwrap();

        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.label(), "src/main/java/com/acme/Auth.java:10");
        assert_eq!(hit.relevance_score, FRAME_SCORE);
        assert_eq!(hit.origin, Origin::StackFrame);
        assert_eq!(hit.snippet, "line 10");
        assert_eq!(hit.context_before.len(), 5);
        assert_eq!(hit.context_after.len(), 5);
        assert_eq!(hit.context_before[0], "line 5");
        assert_eq!(hit.context_after[4], "line 15");
    }

    #[test]
    fn test_first_path_wins_on_duplicate_names()
    {
        let tree = MemorySourceTree::new()
            .with_file("b/utils.js", numbered(3))
            .with_file("a/utils.js", numbered(3));

        let hits =
            StackFrameResolver::resolve(&[frame("utils.js", 2)], &tree, &FileFilter::default())
                .unwrap();
        assert_eq!(hits[0].file_path, PathBuf::from("a/utils.js"));
    }

    #[test]
    fn test_unresolvable_frames_are_dropped()
    {
        let tree = MemorySourceTree::new().with_file("Foo.java", numbered(5));

        let frames = [frame("Missing.java", 1), frame("Foo.java", 6), frame("Foo.java", 5)];
        let hits = StackFrameResolver::resolve(&frames, &tree, &FileFilter::default()).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line_number, 5);
    }

    #[test]
    fn test_excluded_files_are_not_resolved()
    {
        let tree = MemorySourceTree::new().with_file("node_modules/lib/utils.js", numbered(5));
        let filter = FileFilter::new(vec!["**/*.rs".into()], vec!["node_modules/**".into()]);

        let hits = StackFrameResolver::resolve(&[frame("utils.js", 1)], &tree, &filter).unwrap();
        assert!(hits.is_empty());
    }
}
