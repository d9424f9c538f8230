//! `fline trace`: parse a stack trace and map its frames onto the workspace.

use anyhow::Result;
use serde::Serialize;

use crate::cli::{AppContext, TraceArgs};
use crate::cli_ext::common::{load_workspace_config, open_tree, print_json, read_input};
use crate::cli_ext::render;
use crate::core::model::{CandidateLocation, StackFrame};
use crate::core::resolve::StackFrameResolver;
use crate::core::stack_trace::StackTraceParser;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceOutput
{
    frames: Vec<StackFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locations: Option<Vec<CandidateLocation>>,
}

pub fn run(
    args: TraceArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let cfg = load_workspace_config(&args.workspace)?;

    let mut grammars = cfg
        .stack_trace
        .extra_grammars
        .clone();
    grammars.extend(
        args.grammar
            .iter()
            .cloned(),
    );
    let parser = StackTraceParser::with_extra_names(&grammars)?;

    let text = read_input(
        args.input
            .as_deref(),
    )?;
    let frames = parser.parse(&text);

    let locations = if args.parse_only
    {
        None
    }
    else
    {
        let tree = open_tree(&args.workspace.path, &cfg)?;
        Some(StackFrameResolver::resolve(&frames, &tree, &cfg.search.filter())?)
    };

    if args.json
    {
        return print_json(&TraceOutput { frames, locations });
    }

    if frames.is_empty()
    {
        println!("No stack frames recognized.");
        return Ok(());
    }

    println!("Frames ({}):", frames.len());
    for f in &frames
    {
        println!("  {}", render::frame(ctx, f));
    }

    if let Some(locations) = locations
    {
        println!("\nResolved in workspace ({}):", locations.len());
        for (i, loc) in locations
            .iter()
            .enumerate()
        {
            print!("{}", render::location(ctx, i + 1, loc));
        }
    }
    Ok(())
}
