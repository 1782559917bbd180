mod cli;
mod commands;
mod config;
mod loader;
mod transport;
mod ui;
mod walk;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::Project;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
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
    };

    match &cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "mlproj", &mut io::stdout());
            Ok(())
        }
        Command::Show => commands::show::run(&ctx, &Project::open(&cli.project)?),
        Command::Setup(args) => commands::setup::run(&ctx, &Project::open(&cli.project)?, args),
        Command::Load(args) => commands::load::run(&ctx, &Project::open(&cli.project)?, args),
    }
}
