//! **faultline** - Bug localization from free-text defect reports
//!
//! Turns an issue into ranked fault candidates (keyword hits and resolved
//! stack frames), correlates them with recent and suspicious commits, and asks
//! a reasoning collaborator for a structured fix suggestion.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - extraction, search, stack traces, history and suggestions
pub mod core {
    /// Records passed between stages (reports, candidates, frames, commits)
    pub mod model;
    pub use model::{
        Analysis, BugReport, CandidateLocation, CommitRecord, FixSuggestion, IssueInput,
        StackFrame,
    };

    /// Section extraction from free-text descriptions (bilingual headings)
    pub mod sections;
    pub use sections::{ExtractedSections, IssueTextExtractor};

    /// Bounded keyword extraction, encounter order
    pub mod keywords;
    pub use keywords::KeywordExtractor;

    /// Aho-Corasick keyword scan with rayon parallelism
    pub mod search;
    pub use search::CodeSearchEngine;

    /// Pluggable stack-trace grammars (Java, JS/TS, opt-in Python)
    pub mod stack_trace;
    pub use stack_trace::StackTraceParser;

    /// Frame to workspace-file resolution
    pub mod resolve;
    pub use resolve::StackFrameResolver;

    /// Git log correlation and suspicious-commit classification
    pub mod history;
    pub use history::{CommitLog, GitCommitLog, HistoryCorrelator};

    /// Reasoning collaborator boundary (HTTP and command adapters)
    pub mod reasoner;
    pub use reasoner::Reasoner;

    /// Prompt building and tolerant completion parsing
    pub mod suggest;
    pub use suggest::FixSuggestionAssembler;

    /// End-to-end pipeline in a bounded worker pool
    pub mod analyze;
    pub use analyze::{AnalysisError, Analyzer};
}

/// Command handlers behind the CLI subcommands
pub mod cli_ext {
    pub mod analyze_cmd;
    pub mod common;
    pub mod history_cmd;
    pub mod render;
    pub mod search_cmd;
    pub mod trace_cmd;
}

/// Infrastructure - configuration, I/O, walking, processes and logging
pub mod infra {
    /// Layered configuration (file + FAULTLINE__ env) with TOML init
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Memory-mapped file I/O for large files (>1MB threshold)
    pub mod io;
    pub use io::{FileContent, read_file_smart};

    /// Gitignore-aware directory walking with glob filters
    pub mod walk;
    pub use walk::FileWalker;

    /// Read-only source tree boundary (filesystem and in-memory)
    pub mod source;
    pub use source::{FileFilter, FsSourceTree, MemorySourceTree, SourceTree};

    /// Child processes with stdin feeding and a hard timeout
    pub mod process;

    /// tracing-subscriber setup for stderr
    pub mod logging;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, FileWalker, load_config};

// Core types for external consumers
pub use crate::core::{Analysis, AnalysisError, Analyzer, BugReport, IssueInput, Reasoner};
