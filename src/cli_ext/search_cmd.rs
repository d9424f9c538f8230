//! `fline search`: keyword search without the rest of the pipeline.

use anyhow::{Result, bail};
use owo_colors::Style;
use tabled::settings::Style as TableStyle;
use tabled::{Table, Tabled};

use crate::cli::{AppContext, SearchArgs};
use crate::cli_ext::common::{clip, load_workspace_config, open_tree, paint, print_json};
use crate::core::keywords::KeywordExtractor;
use crate::core::model::CandidateLocation;
use crate::core::search::CodeSearchEngine;

const SNIPPET_WIDTH: usize = 80;

#[derive(Tabled)]
struct HitRow
{
    #[tabled(rename = "#")]
    rank: usize,
    location: String,
    score: u32,
    snippet: String,
}

pub fn run(
    args: SearchArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let cfg = load_workspace_config(&args.workspace)?;

    let keywords = match &args.text
    {
        Some(text) => KeywordExtractor::default()
            .with_limit(cfg.search.max_keywords)
            .extract_from_text(text),
        None => args
            .keywords
            .clone(),
    };
    if keywords.is_empty()
    {
        bail!("No usable keywords; pass KEYWORDS... or --text");
    }

    let mut limits = cfg
        .search
        .limits();
    if let Some(limit) = args.limit
    {
        limits.max_results = limit;
    }

    let tree = open_tree(&args.workspace.path, &cfg)?;
    let hits = CodeSearchEngine::new(limits).search(&keywords, &tree, &cfg.search.filter())?;

    if args.json
    {
        return print_json(&hits);
    }

    if !ctx.quiet
    {
        println!("Keywords: {}", paint(ctx, keywords.join(", "), Style::new().cyan()));
    }
    if hits.is_empty()
    {
        println!("No matches.");
        return Ok(());
    }
    println!("{}", table(&hits));
    Ok(())
}

fn table(hits: &[CandidateLocation]) -> String
{
    let rows: Vec<HitRow> = hits
        .iter()
        .enumerate()
        .map(|(i, h)| HitRow {
            rank: i + 1,
            location: h.label(),
            score: h.relevance_score,
            snippet: clip(&h.snippet, SNIPPET_WIDTH),
        })
        .collect();

    Table::new(rows)
        .with(TableStyle::rounded())
        .to_string()
}

#[cfg(test)]
mod tests
{
    use std::path::PathBuf;

    use super::*;
    use crate::core::model::Origin;

    #[test]
    fn test_table_lists_hits_in_rank_order()
    {
        let hits = vec![
            CandidateLocation {
                file_path: PathBuf::from("src/auth.rs"),
                line_number: 12,
                snippet: "fn login(token: &str)".into(),
                relevance_score: 2,
                context_before: vec![],
                context_after: vec![],
                origin: Origin::Keyword,
            },
            CandidateLocation {
                file_path: PathBuf::from("src/web.rs"),
                line_number: 3,
                snippet: "login()".into(),
                relevance_score: 1,
                context_before: vec![],
                context_after: vec![],
                origin: Origin::Keyword,
            },
        ];

        let text = table(&hits);
        assert!(text.contains("src/auth.rs:12"));
        assert!(text.contains("fn login(token: &str)"));
        let first = text
            .find("src/auth.rs:12")
            .unwrap();
        let second = text
            .find("src/web.rs:3")
            .unwrap();
        assert!(first < second);
    }
}
