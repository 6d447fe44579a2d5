use crate::config::{self, Config, DEFAULT_CONFIG_FILE, TOKEN_ENV};
use crate::error::Result;
use std::path::PathBuf;

/// Initialize solarfetch.toml configuration file
pub fn init(path: Option<PathBuf>) -> Result<()> {
    let config_path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if config_path.exists() {
        eprintln!(
            "Configuration file already exists at: {}",
            config_path.display()
        );
        eprintln!("Remove it first if you want to reinitialize.");
        return Ok(());
    }

    config::save(&Config::default(), &config_path)?;

    println!("Configuration file created: {}", config_path.display());
    println!("\nNext steps:");
    println!(
        "1. Set api.token in {} or export {}",
        config_path.display(),
        TOKEN_ENV
    );
    println!("2. Run 'solarfetch reference init --sites <CSV>' to register reference sites");

    Ok(())
}
