//! netinstall CLI - Command-line interface
//!
//! Downloads the latest setup executable, runs it and reports progress in
//! the terminal.

mod commands;
mod error;
mod ui;

use clap::{Parser, Subcommand};
use console::style;

use commands::install::InstallArgs;
use commands::CommonArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "netinstall", version, about = "Network bootstrap installer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download, run and supervise the latest installer (default)
    Install(InstallArgs),
    /// Print the URL that would be downloaded
    Resolve(CommonArgs),
    /// Print the latest available version
    Version(CommonArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Install(args)) => commands::install::run(args),
        Some(Commands::Resolve(args)) => commands::resolve::run(args),
        Some(Commands::Version(args)) => commands::version::run(args),
        None => commands::install::run(InstallArgs::default()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(e.exit_code());
    }
}
