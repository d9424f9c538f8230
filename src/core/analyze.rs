//! The analysis pipeline.
//!
//! Keyword search and stack-frame resolution run side by side, their
//! candidates are merged, and the surviving files are correlated with commit
//! history. The reasoning step comes last and is the only stage that needs a
//! collaborator outside the workspace.
//!
//! Every parallel step runs inside one bounded rayon pool owned by the
//! [`Analyzer`], so `concurrency` caps the whole run.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use chrono::Utc;
use itertools::Itertools;
use serde::Serialize;
use tracing::{info, instrument};

use crate::core::history::{CommitClassifier, CommitLog, HistoryCorrelator, HistoryLimits};
use crate::core::keywords::{DEFAULT_KEYWORD_LIMIT, KeywordExtractor};
use crate::core::model::{
    Analysis, BugReport, CandidateLocation, CommitRecord, StackFrame, rank_locations,
};
use crate::core::reasoner::{Reasoner, ReasonerError};
use crate::core::resolve::StackFrameResolver;
use crate::core::search::{CodeSearchEngine, SearchLimits};
use crate::core::stack_trace::StackTraceParser;
use crate::core::suggest::FixSuggestionAssembler;
use crate::infra::config::Config;
use crate::infra::source::{FileFilter, SourceTree};

/// Default worker count for scans and history queries
pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError
{
    #[error("{stage}: workspace is not accessible")]
    Workspace
    {
        stage: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("reasoning: completion request failed")]
    Reasoning(#[source] ReasonerError),

    #[error("configuration: {0}")]
    Config(String),

    #[error("configuration: cannot start worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Tunables for one analyzer
#[derive(Debug, Clone)]
pub struct AnalyzeOptions
{
    pub filter: FileFilter,
    pub search: SearchLimits,
    pub keyword_limit: usize,
    pub history: HistoryLimits,
    pub classifier: CommitClassifier,
    pub history_enabled: bool,
    pub extra_grammars: Vec<String>,
    pub concurrency: usize,
}

impl Default for AnalyzeOptions
{
    fn default() -> Self
    {
        Self {
            filter: FileFilter::default(),
            search: SearchLimits::default(),
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
            history: HistoryLimits::default(),
            classifier: CommitClassifier::default(),
            history_enabled: true,
            extra_grammars: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl From<&Config> for AnalyzeOptions
{
    fn from(cfg: &Config) -> Self
    {
        Self {
            filter: cfg
                .search
                .filter(),
            search: cfg
                .search
                .limits(),
            keyword_limit: cfg
                .search
                .max_keywords,
            history: cfg
                .history
                .limits(),
            classifier: cfg
                .history
                .classifier(),
            history_enabled: true,
            extra_grammars: cfg
                .stack_trace
                .extra_grammars
                .clone(),
            concurrency: cfg.concurrency,
        }
    }
}

/// Everything gathered before the reasoning step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Investigation
{
    pub keywords: Vec<String>,
    pub frames: Vec<StackFrame>,
    pub locations: Vec<CandidateLocation>,
    pub commits: Vec<CommitRecord>,
}

/// Bounded pool shared by every parallel stage; at least one thread
pub fn worker_pool(concurrency: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError>
{
    rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .thread_name(|i| format!("faultline-{i}"))
        .build()
}

/// Runs the pipeline against one workspace and one commit log
pub struct Analyzer<'a>
{
    tree: &'a dyn SourceTree,
    log: &'a dyn CommitLog,
    options: AnalyzeOptions,
    parser: StackTraceParser,
    assembler: FixSuggestionAssembler,
    pool: rayon::ThreadPool,
}

impl<'a> Analyzer<'a>
{
    pub fn new(
        tree: &'a dyn SourceTree,
        log: &'a dyn CommitLog,
        options: AnalyzeOptions,
    ) -> Result<Self, AnalysisError>
    {
        let parser = StackTraceParser::with_extra_names(&options.extra_grammars)
            .map_err(|e| AnalysisError::Config(e.to_string()))?;
        let pool = worker_pool(options.concurrency)?;

        Ok(Self { tree, log, options, parser, assembler: FixSuggestionAssembler::default(), pool })
    }

    /// Keywords, frames, merged candidates and correlated commits.
    ///
    /// Fails only when the workspace cannot be listed.
    #[instrument(skip_all, fields(issue = %report.issue_key))]
    pub fn investigate(
        &self,
        report: &BugReport,
    ) -> Result<Investigation, AnalysisError>
    {
        let opts = &self.options;

        self.pool
            .install(|| {
                let keywords = KeywordExtractor::default()
                    .with_limit(opts.keyword_limit)
                    .extract_keywords(report);
                let frames = self
                    .parser
                    .parse(trace_text(report));

                let (keyword_hits, stack_hits) = rayon::join(
                    || {
                        CodeSearchEngine::new(opts.search).search(
                            &keywords,
                            self.tree,
                            &opts.filter,
                        )
                    },
                    || StackFrameResolver::resolve(&frames, self.tree, &opts.filter),
                );
                let keyword_hits = keyword_hits
                    .map_err(|source| AnalysisError::Workspace { stage: "code search", source })?;
                let stack_hits = stack_hits.map_err(|source| AnalysisError::Workspace {
                    stage: "stack frame resolution",
                    source,
                })?;

                let locations = merge_locations(
                    stack_hits,
                    keyword_hits,
                    opts.search
                        .max_results,
                );

                let commits = if opts.history_enabled
                {
                    HistoryCorrelator::new(
                        opts.history,
                        opts.classifier
                            .clone(),
                    )
                    .correlate(&distinct_files(&locations), self.log)
                }
                else
                {
                    Vec::new()
                };

                info!(
                    keywords = keywords.len(),
                    frames = frames.len(),
                    locations = locations.len(),
                    commits = commits.len(),
                    "investigation complete"
                );
                Ok(Investigation { keywords, frames, locations, commits })
            })
    }

    /// The prompt the reasoner would receive for this investigation
    pub fn prompt(
        &self,
        report: &BugReport,
        found: &Investigation,
    ) -> String
    {
        self.assembler
            .build_prompt(report, &found.locations, &found.commits)
    }

    /// Full analysis including the fix suggestion
    pub fn analyze(
        &self,
        report: &BugReport,
        reasoner: &dyn Reasoner,
    ) -> Result<Analysis, AnalysisError>
    {
        let found = self.investigate(report)?;
        let parsed = self
            .assembler
            .assemble(report, &found.locations, &found.commits, reasoner)
            .map_err(AnalysisError::Reasoning)?;

        Ok(Analysis {
            issue_key: report
                .issue_key
                .clone(),
            keywords: found.keywords,
            frames: found.frames,
            locations: found.locations,
            commits: found.commits,
            suggestion_source: parsed.source(),
            suggestion: parsed.into_suggestion(),
            generated_at: Utc::now(),
        })
    }
}

/// Explicit trace text when present, else the description
fn trace_text(report: &BugReport) -> &str
{
    report
        .stack_trace_text
        .as_deref()
        .filter(|t| {
            !t.trim()
                .is_empty()
        })
        .unwrap_or(&report.description)
}

/// Stack candidates first, then keyword ones; first `(path, line)` wins,
/// then a stable rank and cap.
pub fn merge_locations(
    stack: Vec<CandidateLocation>,
    keyword: Vec<CandidateLocation>,
    cap: usize,
) -> Vec<CandidateLocation>
{
    let mut seen = HashSet::new();
    let merged = stack
        .into_iter()
        .chain(keyword)
        .filter(|c| {
            seen.insert((
                c.file_path
                    .clone(),
                c.line_number,
            ))
        })
        .collect();

    rank_locations(merged, cap)
}

/// Distinct file paths in ranked order
pub fn distinct_files(locations: &[CandidateLocation]) -> Vec<PathBuf>
{
    locations
        .iter()
        .map(|l| {
            l.file_path
                .clone()
        })
        .unique()
        .collect()
}

#[cfg(test)]
mod tests
{
    use std::path::Path;

    use super::*;
    use crate::core::history::StaticCommitLog;
    use crate::core::model::{IssueInput, Origin, SuggestionSource, SuggestionType};
    use crate::infra::source::MemorySourceTree;

    fn loc(
        path: &str,
        line: usize,
        score: u32,
        origin: Origin,
    ) -> CandidateLocation
    {
        CandidateLocation {
            file_path: PathBuf::from(path),
            line_number: line,
            snippet: String::new(),
            relevance_score: score,
            context_before: vec![],
            context_after: vec![],
            origin,
        }
    }

    fn commit(
        hash: &str,
        message: &str,
    ) -> CommitRecord
    {
        CommitRecord {
            hash: hash.into(),
            author: "dev".into(),
            date: "2024-03-01T10:00:00+00:00".into(),
            message: message.into(),
            files: vec![],
            suspicious: false,
            reason: None,
        }
    }

    fn workspace() -> MemorySourceTree
    {
        let mut auth = String::new();
        for i in 1..=100
        {
            if i == 88
            {
                auth.push_str("        return token.trim();\n");
            }
            else
            {
                auth.push_str(&format!("        // filler {i}\n"));
            }
        }
        MemorySourceTree::new()
            .with_file("src/main/java/com/acme/Auth.java", auth)
            .with_file("src/main/java/com/acme/Session.java", "class Session { String token; }\n")
    }

    fn report() -> BugReport
    {
        BugReport {
            issue_key: "BUG-88".into(),
            summary: "Login crashes with null token".into(),
            description: "java.lang.NullPointerException\n    at com.acme.Auth.login(Auth.java:88)"
                .into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_puts_frames_first_and_dedupes()
    {
        let stack = vec![loc("A.java", 10, 10, Origin::StackFrame)];
        let keyword = vec![
            loc("A.java", 10, 2, Origin::Keyword),
            loc("B.java", 3, 10, Origin::Keyword),
            loc("C.java", 1, 1, Origin::Keyword),
        ];

        let merged = merge_locations(stack, keyword, 20);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].label(), "A.java:10");
        assert_eq!(merged[0].origin, Origin::StackFrame);
        assert_eq!(merged[1].label(), "B.java:3");
        assert_eq!(merged[2].label(), "C.java:1");
    }

    #[test]
    fn test_merge_caps()
    {
        let keyword = (1..=30)
            .map(|i| loc("x.rs", i, 1, Origin::Keyword))
            .collect();
        assert_eq!(merge_locations(vec![], keyword, 20).len(), 20);
    }

    #[test]
    fn test_distinct_files_keep_rank_order()
    {
        let locs = [
            loc("b.rs", 1, 9, Origin::Keyword),
            loc("a.rs", 1, 5, Origin::Keyword),
            loc("b.rs", 2, 3, Origin::Keyword),
        ];
        assert_eq!(distinct_files(&locs), vec![PathBuf::from("b.rs"), PathBuf::from("a.rs")]);
    }

    #[test]
    fn test_investigate_ranks_frame_first_and_correlates()
    {
        let tree = workspace();
        let log = StaticCommitLog::new().with_commits(
            "src/main/java/com/acme/Auth.java",
            vec![commit("c1", "Fix token refresh"), commit("c2", "Refactor login")],
        );
        let analyzer = Analyzer::new(&tree, &log, AnalyzeOptions::default()).unwrap();

        let found = analyzer
            .investigate(&report())
            .unwrap();

        assert_eq!(found.frames.len(), 1);
        let top = &found.locations[0];
        assert_eq!(top.label(), "src/main/java/com/acme/Auth.java:88");
        assert_eq!(top.relevance_score, 10);
        assert_eq!(top.origin, Origin::StackFrame);
        assert!(
            found
                .keywords
                .contains(&"token".to_string())
        );

        assert_eq!(found.commits.len(), 2);
        assert!(found.commits[0].suspicious);
        assert!(!found.commits[1].suspicious);
    }

    #[test]
    fn test_explicit_trace_text_is_preferred()
    {
        let mut r = report();
        r.stack_trace_text = Some("at com.acme.Auth.login(Auth.java:5)".into());
        assert_eq!(trace_text(&r), "at com.acme.Auth.login(Auth.java:5)");

        r.stack_trace_text = Some("   ".into());
        assert_eq!(trace_text(&r), r.description);
    }

    #[test]
    fn test_frames_after_a_heading_like_frame_are_kept()
    {
        let report = BugReport::from_input(IssueInput::new(
            "K-2",
            "Validation crash",
            "Stack trace:\nError: boom\n at com.acme.Auth.login(Auth.java:5)\n at checkExpected (validate.js:3:1)\n at com.acme.Web.handle(Web.java:12)",
        ));

        let files: Vec<String> = StackTraceParser::default()
            .parse(trace_text(&report))
            .into_iter()
            .map(|f| format!("{}:{}", f.file_name, f.line_number))
            .collect();
        assert_eq!(files, vec!["Auth.java:5", "validate.js:3", "Web.java:12"]);
    }

    #[test]
    fn test_history_can_be_disabled()
    {
        let tree = workspace();
        let log = StaticCommitLog::new()
            .with_commits("src/main/java/com/acme/Auth.java", vec![commit("c1", "fix")]);
        let options = AnalyzeOptions { history_enabled: false, concurrency: 1, ..Default::default() };

        let found = Analyzer::new(&tree, &log, options)
            .unwrap()
            .investigate(&report())
            .unwrap();
        assert!(
            found
                .commits
                .is_empty()
        );
    }

    #[test]
    fn test_analyze_with_canned_answer()
    {
        let tree = workspace();
        let log = StaticCommitLog::new();
        let analyzer = Analyzer::new(&tree, &log, AnalyzeOptions::default()).unwrap();

        let reasoner = |_: &str| -> Result<String, ReasonerError> {
            Ok(r#"{"type":"simple","rootCause":"token may be null","fixSteps":["guard null"]}"#.into())
        };
        let analysis = analyzer
            .analyze(&report(), &reasoner)
            .unwrap();

        assert_eq!(analysis.issue_key, "BUG-88");
        assert_eq!(analysis.suggestion_source, SuggestionSource::Parsed);
        assert_eq!(analysis.suggestion.kind, SuggestionType::Simple);
        assert!(
            analysis
                .commits
                .is_empty()
        );
    }

    #[test]
    fn test_reasoner_failure_names_stage()
    {
        let tree = workspace();
        let log = StaticCommitLog::new();
        let analyzer = Analyzer::new(&tree, &log, AnalyzeOptions::default()).unwrap();

        let down = |_: &str| -> Result<String, ReasonerError> { Err(ReasonerError::Other("503".into())) };
        let err = analyzer
            .analyze(&report(), &down)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Reasoning(_)));
        assert!(
            err.to_string()
                .starts_with("reasoning")
        );
    }

    #[test]
    fn test_unknown_grammar_is_a_config_error()
    {
        let tree = MemorySourceTree::new();
        let log = StaticCommitLog::new();
        let options =
            AnalyzeOptions { extra_grammars: vec!["cobol".into()], ..Default::default() };
        assert!(matches!(Analyzer::new(&tree, &log, options), Err(AnalysisError::Config(_))));
    }

    struct Unlistable;

    impl SourceTree for Unlistable
    {
        fn list_files(
            &self,
            _: &FileFilter,
        ) -> io::Result<Vec<PathBuf>>
        {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        fn read_text(
            &self,
            _: &Path,
        ) -> io::Result<String>
        {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn test_unlistable_workspace_is_fatal()
    {
        let log = StaticCommitLog::new();
        let analyzer = Analyzer::new(&Unlistable, &log, AnalyzeOptions::default()).unwrap();

        let err = analyzer
            .investigate(&report())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Workspace { .. }));
    }
}
