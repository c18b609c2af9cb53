//! CLI entry point for the bibarchive tool.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, warn};

mod app;
mod cli;

use app::{exit_handler, runtime, terminal};
use cli::Args;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    Failure,
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Interrupted => 130,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    terminal::init_tracing(terminal::resolve_default_log_level(args.quiet, args.verbose));
    debug!(?args, "CLI arguments parsed");

    let exit = match runtime::run_archive(args).await {
        Ok(()) => ProcessExit::Success,
        Err(err) => {
            let exit = exit_handler::exit_for_error(&err);
            if exit == ProcessExit::Interrupted {
                warn!("Interrupted before the archive was complete");
            } else {
                error!("{err:#}");
            }
            exit
        }
    };
    ExitCode::from(exit.code())
}
