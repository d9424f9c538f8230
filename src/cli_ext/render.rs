//! Human-readable terminal output.

use std::fmt::Write as _;

use itertools::Itertools;
use owo_colors::Style;

use crate::cli::AppContext;
use crate::cli_ext::common::paint;
use crate::core::model::{
    Analysis, CandidateLocation, CommitRecord, FixSuggestion, Origin, StackFrame,
    SuggestionSource, SuggestionType,
};

fn heading(
    ctx: &AppContext,
    out: &mut String,
    title: &str,
)
{
    let _ = writeln!(out, "\n{}", paint(ctx, title, Style::new().bold().underline()));
}

/// One candidate with its numbered context window
pub fn location(
    ctx: &AppContext,
    rank: usize,
    loc: &CandidateLocation,
) -> String
{
    let mut out = String::new();
    let origin = match loc.origin
    {
        Origin::StackFrame => "stack frame",
        Origin::Keyword => "keyword",
    };
    let _ = writeln!(
        out,
        "{:>3}. {}  [score {}, {}]",
        rank,
        paint(ctx, loc.label(), Style::new().cyan()),
        loc.relevance_score,
        origin
    );

    let first = loc
        .line_number
        .saturating_sub(loc.context_before.len());
    for (i, line) in loc
        .context_before
        .iter()
        .enumerate()
    {
        let _ = writeln!(out, "       {:>5} | {}", first + i, line);
    }
    let _ = writeln!(
        out,
        "     {} {:>5} | {}",
        paint(ctx, ">", Style::new().red().bold()),
        loc.line_number,
        paint(ctx, &loc.snippet, Style::new().bold())
    );
    for (i, line) in loc
        .context_after
        .iter()
        .enumerate()
    {
        let _ = writeln!(out, "       {:>5} | {}", loc.line_number + 1 + i, line);
    }
    out
}

pub fn frame(
    ctx: &AppContext,
    f: &StackFrame,
) -> String
{
    let func = match &f.class_name
    {
        Some(class) => format!("{class}.{}", f.function_name),
        None => f
            .function_name
            .clone(),
    };
    format!(
        "{} ({}:{})",
        paint(ctx, func, Style::new().yellow()),
        f.file_name,
        f.line_number
    )
}

pub fn commit(
    ctx: &AppContext,
    c: &CommitRecord,
) -> String
{
    let short: String = c
        .hash
        .chars()
        .take(10)
        .collect();
    let mut line = format!(
        "{} {} {}  {}",
        paint(ctx, short, Style::new().yellow()),
        c.date,
        c.author,
        c.message
    );
    if c.suspicious
    {
        let reason = c
            .reason
            .as_deref()
            .unwrap_or("suspicious");
        let _ = write!(line, "  {}", paint(ctx, format!("[{reason}]"), Style::new().red()));
    }
    line
}

pub fn suggestion(
    ctx: &AppContext,
    s: &FixSuggestion,
    source: SuggestionSource,
) -> String
{
    let mut out = String::new();
    let kind = match s.kind
    {
        SuggestionType::Simple => paint(ctx, "simple", Style::new().green()),
        SuggestionType::Complex => paint(ctx, "complex", Style::new().yellow()),
    };
    let _ = writeln!(out, "Type:        {kind}");
    if source == SuggestionSource::Fallback
    {
        let _ = writeln!(
            out,
            "{}",
            paint(
                ctx,
                "(reasoner answer was unusable; showing a generic fallback)",
                Style::new().dimmed()
            )
        );
    }
    let _ = writeln!(out, "Summary:     {}", s.description);
    let _ = writeln!(out, "Root cause:  {}", s.root_cause);

    let _ = writeln!(out, "Fix steps:");
    for (i, step) in s
        .fix_steps
        .iter()
        .enumerate()
    {
        let _ = writeln!(out, "  {}. {}", i + 1, step);
    }

    if let Some(changes) = &s.code_changes
    {
        let _ = writeln!(out, "Code changes:");
        for change in changes
        {
            let _ = writeln!(
                out,
                "  {}: {}",
                paint(ctx, &change.file, Style::new().cyan()),
                change.description
            );
            if let Some(original) = &change.original
            {
                for l in original.lines()
                {
                    let _ = writeln!(out, "    {}", paint(ctx, format!("- {l}"), Style::new().red()));
                }
            }
            if let Some(replacement) = &change.replacement
            {
                for l in replacement.lines()
                {
                    let _ =
                        writeln!(out, "    {}", paint(ctx, format!("+ {l}"), Style::new().green()));
                }
            }
        }
    }

    let _ = writeln!(out, "Tests:       {}", s.test_suggestions.iter().join("; "));
    let _ = writeln!(out, "Risks:       {}", s.risks.iter().join("; "));
    out
}

/// Full report for `fline analyze`
pub fn analysis(
    ctx: &AppContext,
    a: &Analysis,
) -> String
{
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        paint(ctx, "Analysis for", Style::new().bold()),
        paint(ctx, &a.issue_key, Style::new().bold().cyan())
    );
    let _ = writeln!(out, "Keywords: {}", a.keywords.iter().join(", "));

    if !a
        .frames
        .is_empty()
    {
        heading(ctx, &mut out, &format!("Stack frames ({})", a.frames.len()));
        for f in &a.frames
        {
            let _ = writeln!(out, "  {}", frame(ctx, f));
        }
    }

    heading(ctx, &mut out, &format!("Candidate locations ({})", a.locations.len()));
    if a.locations
        .is_empty()
    {
        let _ = writeln!(out, "  none found");
    }
    for (i, loc) in a
        .locations
        .iter()
        .enumerate()
    {
        out.push_str(&location(ctx, i + 1, loc));
    }

    heading(ctx, &mut out, &format!("Related commits ({})", a.commits.len()));
    for c in &a.commits
    {
        let _ = writeln!(out, "  {}", commit(ctx, c));
    }

    heading(ctx, &mut out, "Suggested fix");
    out.push_str(&suggestion(ctx, &a.suggestion, a.suggestion_source));
    out
}
