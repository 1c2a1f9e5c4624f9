//! Resolve command - show which URL an install would download.

use netinstall::resolver::{ReleaseResolver, SourceResolver};

use super::{init_logging, CommonArgs};
use crate::error::CliError;

/// Run the resolve command.
pub fn run(args: CommonArgs) -> Result<(), CliError> {
    let config = args.load_config()?;
    let _logging = init_logging()?;
    let resolver = ReleaseResolver::from_config(&config)?;

    let source = match resolver.resolve_primary() {
        Ok(source) => source,
        Err(primary) => {
            eprintln!("Primary source unavailable: {}", primary);
            resolver.resolve_fallback()?
        }
    };

    println!("{}", source.url);
    println!("  Source: {:?}", source.origin);
    if source.origin.requires_auth() {
        let signed = if config.auth.is_some() { "yes" } else { "no credentials configured" };
        println!("  Signed: {}", signed);
    }
    Ok(())
}
