use anyhow::Result;
use clap::Parser;
use faultline::cli::{AppContext, Cli, Commands};
use faultline::infra::logging::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        verbose: cli.verbose,
    };
    init_logging(&ctx);

    match cli.command {
        Commands::Analyze(args) => faultline::cli_ext::analyze_cmd::run(args, &ctx),
        Commands::Search(args) => faultline::cli_ext::search_cmd::run(args, &ctx),
        Commands::Trace(args) => faultline::cli_ext::trace_cmd::run(args, &ctx),
        Commands::History(args) => faultline::cli_ext::history_cmd::run(args, &ctx),
        Commands::Init(args) => faultline::infra::config::init(args, &ctx),
        Commands::Completions(args) => faultline::completion::run(args, &ctx),
    }
}
