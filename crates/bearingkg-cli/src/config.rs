//! Configuration loading for the CLI.

use crate::cli::PresetArg;
use crate::error::{CliError, Result};
use bearingkg_extractor::ExtractorConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file path (`~/.bearingkg/config.toml`).
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    Ok(home.join(".bearingkg").join("config.toml"))
}

/// Resolve the extractor configuration.
///
/// An explicit file wins, then a preset, then the default file if it
/// exists, then the built-in defaults.
pub fn load(explicit: Option<&Path>, preset: Option<PresetArg>) -> Result<ExtractorConfig> {
    if let Some(path) = explicit {
        debug!("Loading configuration from {}", path.display());
        return Ok(ExtractorConfig::from_file(path)?);
    }

    if let Some(preset) = preset {
        return Ok(from_preset(preset));
    }

    match default_path() {
        Ok(path) if path.exists() => {
            debug!("Loading configuration from {}", path.display());
            Ok(ExtractorConfig::from_file(&path)?)
        }
        _ => Ok(ExtractorConfig::default()),
    }
}

fn from_preset(preset: PresetArg) -> ExtractorConfig {
    match preset {
        PresetArg::Default => ExtractorConfig::default(),
        PresetArg::Aggressive => ExtractorConfig::aggressive(),
        PresetArg::Lenient => ExtractorConfig::lenient(),
    }
}
