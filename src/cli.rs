use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub verbose: u8,    // global -v count
}

#[derive(Parser)]
#[command(name = "fline")]
#[command(
    about = "Localize a bug from its report: ranked fault candidates, suspicious commits, and a fix suggestion"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress spinners and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full analysis for one issue
    Analyze(AnalyzeArgs),

    /// Keyword search over the workspace
    Search(SearchArgs),

    /// Parse a stack trace and resolve its frames in the workspace
    Trace(TraceArgs),

    /// Show recent and suspicious commits for files
    History(HistoryArgs),

    /// Initialize a faultline.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Workspace selection shared by the scanning commands
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Workspace root to analyze
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Include globs (replace the configured ones)
    #[arg(long)]
    pub include: Vec<String>,

    /// Exclude globs (added to the configured ones)
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Also scan hidden (dot) files and directories
    #[arg(long)]
    pub hidden: bool,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Issue JSON file (issueKey, summary, description, ...); "-" reads stdin
    #[arg(long, conflicts_with_all = ["key", "summary"])]
    pub issue: Option<PathBuf>,

    /// Issue key, e.g. BUG-123
    #[arg(long, requires = "summary")]
    pub key: Option<String>,

    /// One-line issue summary
    #[arg(long)]
    pub summary: Option<String>,

    /// Free-text issue description
    #[arg(long, conflicts_with = "description_file")]
    pub description: Option<String>,

    /// Read the description from a file
    #[arg(long)]
    pub description_file: Option<PathBuf>,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Emit the analysis as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the reasoning prompt and stop before calling the reasoner
    #[arg(long)]
    pub prompt_only: bool,

    /// Skip commit history correlation
    #[arg(long)]
    pub no_history: bool,

    /// Chat-completions endpoint (overrides config)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Model name sent to the endpoint (overrides config)
    #[arg(long)]
    pub model: Option<String>,

    /// External reasoning command after `--`; receives the prompt on stdin
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Keywords to look for
    pub keywords: Vec<String>,

    /// Derive keywords from free text instead
    #[arg(long, conflicts_with = "keywords")]
    pub text: Option<String>,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Maximum results shown
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct TraceArgs {
    /// Stack-trace file; stdin when omitted or "-"
    pub input: Option<PathBuf>,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Extra grammars to register (e.g. python)
    #[arg(short, long)]
    pub grammar: Vec<String>,

    /// Only parse; do not resolve frames against the workspace
    #[arg(long)]
    pub parse_only: bool,

    /// Emit JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// Files to correlate, relative to the repository root
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Repository root
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Commits per file
    #[arg(short = 'n', long)]
    pub max_commits: Option<usize>,

    /// Only show suspicious commits
    #[arg(long)]
    pub suspicious: bool,

    /// Emit JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; required unless --stdout is set
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
