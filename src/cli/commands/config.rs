//! Config command.

use anyhow::Result;

use crate::config::Settings;

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
