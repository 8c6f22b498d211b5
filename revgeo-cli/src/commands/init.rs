//! Init command - write the configuration file.

use std::path::Path;

use revgeo::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
///
/// An existing file is re-read and written back, which fills in keys added
/// since it was created. Unreadable files are replaced with defaults.
pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);

    let config = ConfigFile::load_from(&path).unwrap_or_default();
    config.save_to(&path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to choose a provider and cache backend.");
    println!("Set user_agent in [provider] before using public Nominatim.");
    println!("GITHUB_TOKEN and PORT environment variables override the file.");
    Ok(())
}
