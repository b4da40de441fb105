//! Config command implementation.
//!
//! Manages CLI configuration.

use anyhow::Result;

use crate::config::Config;

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("egx Configuration");
    println!("{:-<40}", "");

    println!("Mode:          {}", config.mode);
    println!("Skip tau:      {}", config.skip_tau);
    println!("Hide tau:      {}", config.hide_tau);
    println!("Output format: {}", config.format);

    if config.hide_tau && !config.skip_tau {
        println!("(hide-tau has no effect while skip-tau is off)");
    }

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value.
pub fn set(config: &mut Config, key: &str, value: &str) -> Result<()> {
    config.set(key, value)?;
    println!("Set {} to: {}", key, config.get(key)?);
    config.save()?;
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    println!("{}", config.get(key)?);
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults");
    Ok(())
}
