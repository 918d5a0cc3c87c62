mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// State file from `--state` or `CIRRUS_STATE`
    pub state: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        state: cli.state,
    };

    match cli.command {
        Command::Plan(args) => commands::converge::plan(&ctx, &args),
        Command::Apply(args) => commands::converge::apply(&ctx, &args),
        Command::Collect(args) => commands::converge::collect(&ctx, &args),
        Command::Diff(args) => commands::converge::diff(&ctx, &args),
        Command::Suggest(cmd) => commands::suggest::run(&ctx, &cmd),
        Command::Config(cmd) => commands::config::run(&ctx, &cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cirrus", &mut io::stdout());
            Ok(())
        }
    }
}
