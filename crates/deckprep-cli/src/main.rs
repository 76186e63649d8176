//! deckprep CLI - unpacks archives and trims slide decks in bulk.

mod cli;
mod commands;
mod error;
mod output;
mod progress;

use clap::Parser;
use std::process::ExitCode;

/// At least one unit failed.
const EXIT_UNIT_FAILURE: u8 = 1;
/// The run could not start.
const EXIT_SETUP_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);

    match &cli.command {
        cli::Commands::Run(args) => {
            let show_progress = !cli.quiet && !cli.json;
            match commands::run::execute(args, &*formatter, show_progress) {
                Ok(report) if report.has_failures() => ExitCode::from(EXIT_UNIT_FAILURE),
                Ok(_) => ExitCode::SUCCESS,
                Err(err) => {
                    formatter.format_error(&err);
                    ExitCode::from(EXIT_SETUP_FAILURE)
                }
            }
        }
        cli::Commands::Completion { shell } => {
            commands::completion::execute(*shell);
            ExitCode::SUCCESS
        }
    }
}

/// `warn` by default, `info` with `--verbose`, `error` with `--quiet`.
/// `RUST_LOG` takes precedence when set.
fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
