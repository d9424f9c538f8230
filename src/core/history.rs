//! Version-control history correlation
//!
//! Pulls the recent commits touching each candidate file and flags commits
//! whose message looks like a previous fix. Each file is queried on its own;
//! a failing query only costs that file's records.

use indexmap::IndexMap;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::model::CommitRecord;
use crate::infra::process::{ProcessError, run_with_timeout};

/// Files correlated per analysis
pub const DEFAULT_MAX_FILES: usize = 5;

/// Commits kept per file
pub const DEFAULT_MAX_COMMITS: usize = 10;

/// Per-file git timeout
pub const DEFAULT_LOG_TIMEOUT: Duration = Duration::from_secs(5);

/// Fix-related terms, matched case-insensitively as substrings
pub const DEFAULT_SUSPICIOUS_TERMS: &[&str] = &[
    "fix", "bug", "hotfix", "patch", "crash", "revert", "修复", "缺陷", "补丁", "错误",
];

/// Start of one record in `git log` output
const RECORD_SEP: char = '\u{1e}';

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("git log failed for {path}")]
    Git {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("no history available for {0}")]
    Unavailable(PathBuf),
}

/// Source of recent commits for a file
pub trait CommitLog: Send + Sync {
    /// Most recent commits touching `file`, newest first, unclassified
    fn recent_commits(&self, file: &Path, limit: usize) -> Result<Vec<CommitRecord>, HistoryError>;
}

/// `git log` in a working tree
#[derive(Debug, Clone)]
pub struct GitCommitLog {
    repo_root: PathBuf,
    timeout: Duration,
    git: String,
}

impl GitCommitLog {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            timeout: DEFAULT_LOG_TIMEOUT,
            git: "git".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a different git executable
    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }
}

impl CommitLog for GitCommitLog {
    fn recent_commits(&self, file: &Path, limit: usize) -> Result<Vec<CommitRecord>, HistoryError> {
        let args = vec![
            "log".to_string(),
            format!("-n{limit}"),
            "--full-diff".to_string(),
            "--name-only".to_string(),
            "--date=iso-strict".to_string(),
            "--format=%x1e%H|%an|%ad|%s".to_string(),
            "--".to_string(),
            file.to_string_lossy().into_owned(),
        ];

        let output = run_with_timeout(&self.git, &args, Some(&self.repo_root), None, self.timeout)
            .map_err(|source| HistoryError::Git {
                path: file.to_path_buf(),
                source,
            })?;

        Ok(parse_git_log(&output.stdout))
    }
}

/// Canned commits per file, for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticCommitLog {
    commits: IndexMap<PathBuf, Vec<CommitRecord>>,
}

impl StaticCommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commits(mut self, file: impl Into<PathBuf>, commits: Vec<CommitRecord>) -> Self {
        self.commits.insert(file.into(), commits);
        self
    }
}

impl CommitLog for StaticCommitLog {
    fn recent_commits(&self, file: &Path, limit: usize) -> Result<Vec<CommitRecord>, HistoryError> {
        let commits = self
            .commits
            .get(file)
            .ok_or_else(|| HistoryError::Unavailable(file.to_path_buf()))?;
        Ok(commits.iter().take(limit).cloned().collect())
    }
}

/// Parse `hash|author|date|message` records, each followed by its file list.
/// The message is the remainder after the third `|` and may contain `|`.
pub fn parse_git_log(stdout: &str) -> Vec<CommitRecord> {
    stdout
        .split(RECORD_SEP)
        .filter_map(|chunk| {
            let mut lines = chunk.lines();
            let header = lines.next()?;
            let mut record = parse_log_line(header)?;
            record.files = lines
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            Some(record)
        })
        .collect()
}

/// Parse one `hash|author|date|message` line
pub fn parse_log_line(line: &str) -> Option<CommitRecord> {
    let mut parts = line.trim().splitn(4, '|');
    let hash = parts.next()?.trim();
    let author = parts.next()?.trim();
    let date = parts.next()?.trim();
    let message = parts.next().unwrap_or_default().trim();

    if hash.is_empty() {
        return None;
    }

    Some(CommitRecord {
        hash: hash.to_string(),
        author: author.to_string(),
        date: date.to_string(),
        message: message.to_string(),
        files: Vec::new(),
        suspicious: false,
        reason: None,
    })
}

/// Flags fix-looking commits
#[derive(Debug, Clone)]
pub struct CommitClassifier {
    terms: Vec<String>,
}

impl Default for CommitClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SUSPICIOUS_TERMS.iter().map(|t| t.to_string()).collect())
    }
}

impl CommitClassifier {
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms: terms.into_iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// Matched terms, in term-list order
    pub fn matches(&self, message: &str) -> Vec<&str> {
        let lowered = message.to_lowercase();
        self.terms
            .iter()
            .filter(|t| !t.is_empty() && lowered.contains(t.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Set `suspicious` and `reason` from the message
    pub fn classify(&self, mut record: CommitRecord) -> CommitRecord {
        let hits = self.matches(&record.message);
        record.suspicious = !hits.is_empty();
        record.reason = if hits.is_empty() {
            None
        } else {
            Some(format!("message mentions: {}", hits.join(", ")))
        };
        record
    }
}

/// Cost bounds for correlation
#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    pub max_files: usize,
    pub max_commits: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_commits: DEFAULT_MAX_COMMITS,
        }
    }
}

/// Correlates candidate files with recent commits
#[derive(Debug, Clone, Default)]
pub struct HistoryCorrelator {
    limits: HistoryLimits,
    classifier: CommitClassifier,
}

impl HistoryCorrelator {
    pub fn new(limits: HistoryLimits, classifier: CommitClassifier) -> Self {
        Self { limits, classifier }
    }

    /// Classified commits for the first few distinct files, in file order.
    ///
    /// A commit touching several candidate files appears once, at the
    /// position of its first file, with the file lists merged.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn correlate(&self, files: &[PathBuf], log: &dyn CommitLog) -> Vec<CommitRecord> {
        let mut distinct: Vec<&PathBuf> = Vec::new();
        for f in files {
            if distinct.len() >= self.limits.max_files {
                break;
            }
            if !distinct.contains(&f) {
                distinct.push(f);
            }
        }

        let per_file: Vec<Vec<CommitRecord>> = distinct
            .par_iter()
            .map(|file| match log.recent_commits(file, self.limits.max_commits) {
                Ok(mut commits) => {
                    commits.truncate(self.limits.max_commits);
                    debug!(file = %file.display(), commits = commits.len(), "history");
                    commits
                }
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "history query failed, skipping file");
                    Vec::new()
                }
            })
            .collect();

        let mut merged: IndexMap<String, CommitRecord> = IndexMap::new();
        for commit in per_file.into_iter().flatten() {
            match merged.get_mut(&commit.hash) {
                Some(existing) => {
                    for f in commit.files {
                        if !existing.files.contains(&f) {
                            existing.files.push(f);
                        }
                    }
                }
                None => {
                    merged.insert(commit.hash.clone(), self.classifier.classify(commit));
                }
            }
        }

        merged.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(hash: &str, message: &str, files: &[&str]) -> CommitRecord {
        CommitRecord {
            hash: hash.to_string(),
            author: "dev".to_string(),
            date: "2024-05-01T10:00:00+00:00".to_string(),
            message: message.to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
            suspicious: false,
            reason: None,
        }
    }

    #[test]
    fn test_classify_fix_commit() {
        let c = CommitClassifier::default().classify(commit("a", "fix: null pointer in parser", &[]));
        assert!(c.suspicious);
        assert!(!c.reason.unwrap().is_empty());
    }

    #[test]
    fn test_classify_refactor_commit() {
        let c = CommitClassifier::default().classify(commit("a", "refactor: rename variable", &[]));
        assert!(!c.suspicious);
        assert!(c.reason.is_none());
    }

    #[test]
    fn test_classify_is_case_insensitive_and_bilingual() {
        let classifier = CommitClassifier::default();
        assert!(classifier.classify(commit("a", "HOTFIX for release", &[])).suspicious);
        assert!(classifier.classify(commit("b", "修复登录问题", &[])).suspicious);

        let reason = classifier
            .classify(commit("c", "Bugfix: patch crash", &[]))
            .reason
            .unwrap();
        assert_eq!(reason, "message mentions: fix, bug, patch, crash");
    }

    #[test]
    fn test_parse_log_line_keeps_pipes_in_message() {
        let r = parse_log_line("abc123|Jane Doe|2024-01-02T03:04:05+00:00|fix: a | b").unwrap();
        assert_eq!(r.hash, "abc123");
        assert_eq!(r.author, "Jane Doe");
        assert_eq!(r.date, "2024-01-02T03:04:05+00:00");
        assert_eq!(r.message, "fix: a | b");
    }

    #[test]
    fn test_parse_log_line_rejects_garbage() {
        assert!(parse_log_line("").is_none());
        assert!(parse_log_line("no separators here").is_none());
    }

    #[test]
    fn test_parse_git_log_with_files() {
        let out = "\u{1e}aaa|A|2024-01-02|fix: one\n\nsrc/a.rs\nsrc/b.rs\n\u{1e}bbb|B|2024-01-01|init\n\nsrc/a.rs\n";
        let commits = parse_git_log(out);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "aaa");
        assert_eq!(commits[0].files, vec!["src/a.rs", "src/b.rs"]);
        assert_eq!(commits[1].message, "init");
        assert_eq!(commits[1].files, vec!["src/a.rs"]);
    }

    #[test]
    fn test_correlate_bounds_and_isolates_failures() {
        let log = StaticCommitLog::new()
            .with_commits(
                "a.rs",
                (0..15).map(|i| commit(&format!("a{i}"), "tweak", &["a.rs"])).collect(),
            )
            .with_commits("c.rs", vec![commit("c0", "fix crash", &["c.rs"])]);

        // b.rs has no history and must not stop c.rs
        let files = vec![PathBuf::from("a.rs"), PathBuf::from("b.rs"), PathBuf::from("c.rs")];
        let commits = HistoryCorrelator::default().correlate(&files, &log);

        assert_eq!(commits.len(), 11);
        assert!(commits[..10].iter().all(|c| c.hash.starts_with('a')));
        assert_eq!(commits[10].hash, "c0");
        assert!(commits[10].suspicious);
    }

    #[test]
    fn test_correlate_only_first_five_distinct_files() {
        let mut log = StaticCommitLog::new();
        let mut files = Vec::new();
        for i in 0..8 {
            let name = format!("f{i}.rs");
            log = log.with_commits(name.as_str(), vec![commit(&format!("h{i}"), "m", &[])]);
            files.push(PathBuf::from(&name));
            // duplicates must not consume the budget
            files.push(PathBuf::from(&name));
        }

        let commits = HistoryCorrelator::default().correlate(&files, &log);
        let hashes: Vec<_> = commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["h0", "h1", "h2", "h3", "h4"]);
    }

    #[test]
    fn test_correlate_merges_shared_commits() {
        let shared = commit("s", "fix both", &["a.rs", "b.rs"]);
        let log = StaticCommitLog::new()
            .with_commits("a.rs", vec![commit("s", "fix both", &["a.rs"])])
            .with_commits("b.rs", vec![shared, commit("t", "docs", &["b.rs"])]);

        let files = vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")];
        let commits = HistoryCorrelator::default().correlate(&files, &log);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "s");
        assert_eq!(commits[0].files, vec!["a.rs", "b.rs"]);
        assert_eq!(commits[1].hash, "t");
    }

    #[test]
    fn test_missing_git_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = GitCommitLog::new(tmp.path()).with_git("definitely-not-git-xyz");
        let err = log.recent_commits(Path::new("x.rs"), 10).unwrap_err();
        assert!(matches!(
            err,
            HistoryError::Git {
                source: ProcessError::Spawn { .. },
                ..
            }
        ));
    }
}
