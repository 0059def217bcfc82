//! Patchbay CLI - apply a plan of edits to a checkout, keep what succeeds.

use clap::Parser;

mod commands;
mod logging;
mod output;
mod plan;

use commands::{Cli, Commands};

/// Exit code when some step failed but a patch was still produced.
const EXIT_STEP_FAILED: i32 = 2;

fn main() {
    let cli = Cli::parse();
    logging::init();
    output::set_quiet(cli.quiet);

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(&args),
        Commands::Completions { shell } => commands::completions::run(shell).map(|()| true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_STEP_FAILED),
        Err(e) => {
            output::error(&format!("{e:#}"));
            std::process::exit(1);
        }
    }
}
