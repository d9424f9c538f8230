//! Plumbing shared by the command handlers: config overrides, workspace
//! opening, input reading and terminal styling.

use std::fmt::Display;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Style};
use serde::Serialize;

use crate::cli::{AppContext, WorkspaceArgs};
use crate::infra::config::{Config, load_config};
use crate::infra::source::FsSourceTree;

/// Configuration with the command-line workspace flags applied.
///
/// `--include` replaces the configured includes; `--exclude` adds to the
/// configured excludes.
pub fn load_workspace_config(ws: &WorkspaceArgs) -> Result<Config>
{
    let mut cfg = load_config()?;
    apply_workspace_overrides(&mut cfg, ws);
    Ok(cfg)
}

pub fn apply_workspace_overrides(
    cfg: &mut Config,
    ws: &WorkspaceArgs,
)
{
    if !ws
        .include
        .is_empty()
    {
        cfg.search.include = ws.include.clone();
    }
    cfg.search.exclude.extend(ws.exclude.iter().cloned());
    cfg.search.include_hidden |= ws.hidden;
}

pub fn open_tree(
    root: &Path,
    cfg: &Config,
) -> Result<FsSourceTree>
{
    let tree = FsSourceTree::open(root)
        .with_context(|| format!("workspace root {} is not accessible", root.display()))?;
    Ok(tree.with_include_hidden(cfg.search.include_hidden))
}

/// File contents, or stdin when `path` is absent or `-`
pub fn read_input(path: Option<&Path>) -> Result<String>
{
    match path
    {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read {}", p.display())),
        _ =>
        {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()>
{
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

/// Styled text, or plain text under `--no-color`
pub fn paint(
    ctx: &AppContext,
    text: impl Display,
    style: Style,
) -> String
{
    if ctx.no_color
    {
        text.to_string()
    }
    else
    {
        text.style(style)
            .to_string()
    }
}

/// Spinner on stderr; hidden under `--quiet`
pub fn spinner(
    ctx: &AppContext,
    message: &str,
) -> ProgressBar
{
    if ctx.quiet
    {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Shorten to `max` characters, marking the cut
pub fn clip(
    text: &str,
    max: usize,
) -> String
{
    if text
        .chars()
        .count()
        <= max
    {
        return text.to_string();
    }
    let mut out: String = text
        .chars()
        .take(max.saturating_sub(1))
        .collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests
{
    use std::path::PathBuf;

    use super::*;
    use crate::infra::source::SourceTree;

    #[test]
    fn test_overrides_replace_includes_and_extend_excludes()
    {
        let mut cfg = Config::default();
        let base_excludes = cfg
            .search
            .exclude
            .len();
        let ws = WorkspaceArgs {
            path: PathBuf::from("."),
            include: vec!["**/*.kt".into()],
            exclude: vec!["legacy/**".into()],
            hidden: true,
        };

        apply_workspace_overrides(&mut cfg, &ws);
        assert_eq!(cfg.search.include, vec!["**/*.kt"]);
        assert_eq!(cfg.search.exclude.len(), base_excludes + 1);
        assert!(cfg.search.include_hidden);
    }

    #[test]
    fn test_open_tree_follows_hidden_policy()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(".ci")).unwrap();
        std::fs::write(tmp.path().join(".ci/Build.java"), "class Build {}").unwrap();
        std::fs::write(tmp.path().join("App.java"), "class App {}").unwrap();

        let mut cfg = Config::default();
        let filter = cfg.search.filter();
        let files = open_tree(tmp.path(), &cfg)
            .unwrap()
            .list_files(&filter)
            .unwrap();
        assert_eq!(files, vec![PathBuf::from("App.java")]);

        cfg.search.include_hidden = true;
        let files = open_tree(tmp.path(), &cfg)
            .unwrap()
            .list_files(&filter)
            .unwrap();
        assert!(files.contains(&PathBuf::from(".ci/Build.java")));
    }

    #[test]
    fn test_paint_respects_no_color()
    {
        let ctx = AppContext { quiet: true, no_color: true, verbose: 0 };
        assert_eq!(paint(&ctx, "x", Style::new().red()), "x");

        let ctx = AppContext { no_color: false, ..ctx };
        assert_ne!(paint(&ctx, "x", Style::new().red()), "x");
    }

    #[test]
    fn test_clip()
    {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_read_input_from_file()
    {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "trace").unwrap();
        assert_eq!(read_input(Some(tmp.path())).unwrap(), "trace");
    }
}
