//! `fline analyze`: the full pipeline for one issue.

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use crate::cli::{AnalyzeArgs, AppContext};
use crate::cli_ext::common::{load_workspace_config, open_tree, print_json, read_input, spinner};
use crate::cli_ext::render;
use crate::core::analyze::{AnalyzeOptions, Analyzer};
use crate::core::history::GitCommitLog;
use crate::core::model::{BugReport, IssueInput};
use crate::infra::config::Config;

#[instrument(skip_all)]
pub fn run(
    args: AnalyzeArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut cfg = load_workspace_config(&args.workspace)?;
    apply_reasoner_overrides(&mut cfg, &args);

    let report = BugReport::from_input(issue_input(&args)?);
    info!(issue = %report.issue_key, "analyzing");

    let tree = open_tree(&args.workspace.path, &cfg)?;
    let log = GitCommitLog::new(tree.root()).with_timeout(cfg.history.timeout());

    let mut options = AnalyzeOptions::from(&cfg);
    options.history_enabled = !args.no_history;
    let analyzer = Analyzer::new(&tree, &log, options)?;

    if args.prompt_only
    {
        let found = analyzer.investigate(&report)?;
        print!("{}", analyzer.prompt(&report, &found));
        return Ok(());
    }

    let reasoner = cfg
        .reasoner
        .build()
        .context("reasoning: cannot set up the reasoner")?;

    let pb = spinner(ctx, &format!("Analyzing {}", report.issue_key));
    let result = analyzer.analyze(&report, reasoner.as_ref());
    pb.finish_and_clear();
    let analysis = result?;

    if args.json
    {
        print_json(&analysis)
    }
    else
    {
        print!("{}", render::analysis(ctx, &analysis));
        Ok(())
    }
}

/// `--endpoint`, `--model` and a trailing `-- COMMAND` win over the config file
fn apply_reasoner_overrides(
    cfg: &mut Config,
    args: &AnalyzeArgs,
)
{
    if let Some(endpoint) = &args.endpoint
    {
        cfg.reasoner.endpoint = endpoint.clone();
    }
    if let Some(model) = &args.model
    {
        cfg.reasoner.model = model.clone();
    }
    if !args
        .command
        .is_empty()
    {
        cfg.reasoner.command = args
            .command
            .clone();
    }
}

/// Issue from `--issue` JSON, or assembled from the individual flags
fn issue_input(args: &AnalyzeArgs) -> Result<IssueInput>
{
    if let Some(path) = &args.issue
    {
        let text = read_input(Some(path))?;
        return serde_json::from_str(&text).context("Issue JSON needs issueKey, summary and description");
    }

    let (Some(key), Some(summary)) = (&args.key, &args.summary)
    else
    {
        bail!("Provide --issue <file> or --key and --summary");
    };

    let description = match (&args.description, &args.description_file)
    {
        (Some(d), _) => d.clone(),
        (None, Some(path)) => read_input(Some(path))?,
        (None, None) => String::new(),
    };

    Ok(IssueInput::new(key.clone(), summary.clone(), description))
}
