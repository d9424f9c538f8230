//! `fline history`: commit correlation for explicit files.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::{AppContext, HistoryArgs};
use crate::cli_ext::common::print_json;
use crate::cli_ext::render;
use crate::core::analyze::worker_pool;
use crate::core::history::{CommitLog, GitCommitLog, HistoryCorrelator};
use crate::core::model::CommitRecord;
use crate::infra::config::load_config;

pub fn run(
    args: HistoryArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let cfg = load_config()?;

    let mut limits = cfg
        .history
        .limits();
    if let Some(n) = args.max_commits
    {
        limits.max_commits = n;
    }

    let log = GitCommitLog::new(&args.path).with_timeout(cfg.history.timeout());
    let correlator = HistoryCorrelator::new(
        limits,
        cfg.history
            .classifier(),
    );

    let mut commits = correlate_bounded(&correlator, &args.files, &log, cfg.concurrency)?;
    if args.suspicious
    {
        commits.retain(|c| c.suspicious);
    }

    if args.json
    {
        return print_json(&commits);
    }

    if commits.is_empty()
    {
        println!("No commits found.");
        return Ok(());
    }
    for c in &commits
    {
        println!("{}", render::commit(ctx, c));
        if !ctx.quiet
        {
            for f in &c.files
            {
                println!("    {f}");
            }
        }
    }
    Ok(())
}

/// Per-file queries on a pool of `concurrency` threads
fn correlate_bounded(
    correlator: &HistoryCorrelator,
    files: &[PathBuf],
    log: &dyn CommitLog,
    concurrency: usize,
) -> Result<Vec<CommitRecord>>
{
    let pool = worker_pool(concurrency).context("Failed to start worker pool")?;
    Ok(pool.install(|| correlator.correlate(files, log)))
}
