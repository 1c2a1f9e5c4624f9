//! Version command - print the latest available version.

use netinstall::resolver::ReleaseResolver;

use super::{init_logging, CommonArgs};
use crate::error::CliError;

/// Run the version command.
pub fn run(args: CommonArgs) -> Result<(), CliError> {
    let config = args.load_config()?;
    let _logging = init_logging()?;

    let version = ReleaseResolver::from_config(&config)?.latest_version()?;
    println!("{}", version);
    Ok(())
}
