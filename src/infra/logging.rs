//! stderr logging via `tracing-subscriber`.
//!
//! `FAULTLINE_LOG` takes a full `EnvFilter` directive and wins over `-v`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoUtc;

use crate::cli::AppContext;

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV: &str = "FAULTLINE_LOG";

/// Directive used when `FAULTLINE_LOG` is unset
pub fn default_directive(
    verbose: u8,
    quiet: bool,
) -> String
{
    let level = if quiet
    {
        "error"
    }
    else
    {
        match verbose
        {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let base = if quiet { "error" } else { "warn" };
    format!("{base},faultline={level}")
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(ctx: &AppContext)
{
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(ctx.verbose, ctx.quiet)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_timer(ChronoUtc::rfc_3339())
        .with_target(ctx.verbose >= 2)
        .with_ansi(!ctx.no_color)
        .compact()
        .try_init();
}
