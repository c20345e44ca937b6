//! Config command implementation.

use crate::error::{CliError, Result};
use bearingkg_extractor::ExtractorConfig;

/// Execute the config command.
pub fn execute_config(config: &ExtractorConfig) -> Result<()> {
    let toml = config.to_toml().map_err(CliError::Config)?;
    print!("{}", toml);
    Ok(())
}
