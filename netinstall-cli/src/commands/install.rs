//! Install command - download, run and supervise the latest installer.

use std::path::PathBuf;

use clap::Args;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use netinstall::orchestrator::{STATUS_COMPLETE, STATUS_FALLBACK};
use netinstall::resolver::ReleaseResolver;
use netinstall::{InstallEvent, InstallOutcome, Installer};
use tracing::warn;

use super::{init_logging, CommonArgs};
use crate::error::CliError;
use crate::ui::ProgressView;

/// Log lines printed after a failed installation.
const LOG_TAIL_LINES: usize = 20;

/// Arguments for the install command.
#[derive(Debug, Clone, Default, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Directory to download the installer into
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print the full session log when done
    #[arg(long)]
    pub show_logs: bool,
}

/// The first line shown to the user.
pub fn welcome_line(version: Option<&str>) -> String {
    match version {
        Some(version) => format!("Installing version {} on your computer", version),
        None => "Installing the latest version on your computer".to_string(),
    }
}

/// Run the install command.
pub fn run(args: InstallArgs) -> Result<(), CliError> {
    let mut config = args.common.load_config()?;
    if let Some(dir) = args.dir {
        config = config.with_download_dir(dir);
    }
    let logging = init_logging()?;

    // Only for the welcome line; the session resolves again on its own.
    let version = match ReleaseResolver::from_config(&config).and_then(|r| r.latest_version()) {
        Ok(version) => Some(version),
        Err(e) => {
            warn!(error = %e, "Could not look up the latest version");
            None
        }
    };

    println!("{}", style(welcome_line(version.as_deref())).bold());
    println!("  Download to: {}", config.destination().display());
    println!();

    if !args.yes && !config.update_mode && !confirm()? {
        println!("Installation aborted.");
        return Ok(());
    }

    let installer = Installer::from_config(&config)?;
    let mut handle = installer.start()?;

    let cancel = handle.cancellation_token();
    ctrlc::set_handler(move || cancel.cancel())
        .map_err(|e| CliError::SignalHandler(e.to_string()))?;

    let mut view = ProgressView::new();
    let mut outcome = None;
    while let Some(event) = handle.recv() {
        match event {
            InstallEvent::Progress(progress) => view.progress(progress),
            InstallEvent::Status(message) => {
                // Keep the switch to the backup source visible after the bar moves on.
                if message == STATUS_FALLBACK {
                    view.println(format!("{} {}", style("!").yellow().bold(), message));
                }
                view.status(&message);
            }
            InstallEvent::Finished(result) => outcome = Some(result),
        }
    }

    let result = match outcome {
        Some(InstallOutcome::Success { .. }) => {
            view.finish(format!("{} {}", style("✔").green().bold(), STATUS_COMPLETE));
            Ok(())
        }
        Some(InstallOutcome::Failure(err)) => {
            view.finish(format!("{} {}", style("✖").red().bold(), style("Installation failed").red()));
            if !args.show_logs {
                println!();
                println!("{}", style("Recent log output:").dim());
                for line in logging.buffer().tail(LOG_TAIL_LINES) {
                    println!("  {}", style(line).dim());
                }
            }
            Err(CliError::Install(err))
        }
        None => {
            view.finish(style("Installation stopped").red().to_string());
            Err(CliError::SessionLost)
        }
    };

    if args.show_logs {
        println!();
        println!("{}", logging.buffer().contents());
    }
    if let Some(path) = logging.log_file() {
        println!("{}", style(format!("Log file: {}", path.display())).dim());
    }

    result
}

fn confirm() -> Result<bool, CliError> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Download and run the installer now?")
        .default(true)
        .interact()
        .map_err(|e| CliError::Prompt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_line() {
        assert_eq!(
            welcome_line(Some("9.4.1")),
            "Installing version 9.4.1 on your computer"
        );
        assert_eq!(
            welcome_line(None),
            "Installing the latest version on your computer"
        );
    }
}
