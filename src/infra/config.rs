use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::analyze::DEFAULT_CONCURRENCY;
use crate::core::history::{
    CommitClassifier, DEFAULT_LOG_TIMEOUT, DEFAULT_MAX_COMMITS, DEFAULT_MAX_FILES,
    DEFAULT_SUSPICIOUS_TERMS, HistoryLimits,
};
use crate::core::keywords::DEFAULT_KEYWORD_LIMIT;
use crate::core::reasoner::{
    CommandReasoner, DEFAULT_TIMEOUT, HttpReasoner, MAX_TIMEOUT, Reasoner, ReasonerError,
};
use crate::core::search::{DEFAULT_MAX_FILES as SEARCH_MAX_FILES, DEFAULT_MAX_RESULTS, SearchLimits};
use crate::infra::source::FileFilter;

/// Config files looked up in the working directory, first hit wins
pub const CONFIG_FILES: [&str; 4] =
    ["faultline.toml", "faultline.yaml", "faultline.json", ".faultline.toml"];

/// List-valued keys that may be given as comma-separated env values
const LIST_KEYS: [&str; 5] = [
    "search.include",
    "search.exclude",
    "history.suspicious_terms",
    "reasoner.command",
    "stack_trace.extra_grammars",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Worker threads for file scans and history queries
    pub concurrency: usize,

    /// Keyword search over the workspace
    pub search: SearchConfig,

    /// Commit history correlation
    pub history: HistoryConfig,

    /// Reasoning endpoint or command
    pub reasoner: ReasonerConfig,

    /// Stack-trace grammar registry
    pub stack_trace: StackTraceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig
{
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_files: usize,
    pub max_results: usize,
    pub max_keywords: usize,
    /// Scan dotfiles and dot-directories too
    pub include_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig
{
    pub max_files: usize,
    pub max_commits: usize,
    pub timeout_secs: u64,
    pub suspicious_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig
{
    /// OpenAI-compatible chat completions URL
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer key; empty sends none
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// External command used instead of the endpoint when non-empty
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackTraceConfig
{
    /// Grammars registered after the built-in Java and JS ones
    pub extra_grammars: Vec<String>,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            search: SearchConfig::default(),
            history: HistoryConfig::default(),
            reasoner: ReasonerConfig::default(),
            stack_trace: StackTraceConfig::default(),
        }
    }
}

impl Default for SearchConfig
{
    fn default() -> Self
    {
        let include = [
            "java", "kt", "scala", "groovy", "js", "jsx", "mjs", "cjs", "ts", "tsx", "vue", "py",
            "go", "rs", "rb", "php", "cs", "c", "cc", "cpp", "h", "hpp", "swift", "m",
        ];
        Self {
            include: include
                .iter()
                .map(|ext| format!("**/*.{ext}"))
                .collect(),
            exclude: vec![
                "**/.git/**".to_string(),
                "**/target/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
                "**/*.min.js".to_string(),
            ],
            max_files: SEARCH_MAX_FILES,
            max_results: DEFAULT_MAX_RESULTS,
            max_keywords: DEFAULT_KEYWORD_LIMIT,
            include_hidden: false,
        }
    }
}

impl Default for HistoryConfig
{
    fn default() -> Self
    {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_commits: DEFAULT_MAX_COMMITS,
            timeout_secs: DEFAULT_LOG_TIMEOUT.as_secs(),
            suspicious_terms: DEFAULT_SUSPICIOUS_TERMS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl Default for ReasonerConfig
{
    fn default() -> Self
    {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            command: Vec::new(),
        }
    }
}

impl SearchConfig
{
    pub fn filter(&self) -> FileFilter
    {
        FileFilter::new(
            self.include
                .clone(),
            self.exclude
                .clone(),
        )
    }

    pub fn limits(&self) -> SearchLimits
    {
        SearchLimits { max_files: self.max_files, max_results: self.max_results }
    }
}

impl HistoryConfig
{
    pub fn limits(&self) -> HistoryLimits
    {
        HistoryLimits { max_files: self.max_files, max_commits: self.max_commits }
    }

    pub fn classifier(&self) -> CommitClassifier
    {
        CommitClassifier::new(
            self.suspicious_terms
                .clone(),
        )
    }

    pub fn timeout(&self) -> Duration
    {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ReasonerConfig
{
    /// Configured timeout, never above the hard ceiling
    pub fn timeout(&self) -> Duration
    {
        Duration::from_secs(self.timeout_secs).min(MAX_TIMEOUT)
    }

    /// The command adapter when a command is configured, else the endpoint
    pub fn build(&self) -> Result<Box<dyn Reasoner>, ReasonerError>
    {
        if let Some(cmd) = CommandReasoner::from_argv(&self.command)
        {
            return Ok(Box::new(cmd.with_timeout(self.timeout())));
        }

        let http = HttpReasoner::new(
            self.endpoint
                .clone(),
            self.model
                .clone(),
        )
        .with_timeout(self.timeout());

        if self
            .api_key_env
            .is_empty()
        {
            Ok(Box::new(http))
        }
        else
        {
            Ok(Box::new(http.with_api_key_from_env(&self.api_key_env)?))
        }
    }
}

/// Load from the working directory
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load from the first config file found in `dir`, then `FAULTLINE__*` env
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    for name in CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    let mut env = config::Environment::with_prefix("FAULTLINE")
        .separator("__")
        .try_parsing(true)
        .list_separator(",");
    for key in LIST_KEYS
    {
        env = env.with_list_parse_key(key);
    }
    builder = builder.add_source(env);

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let toml_string =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
