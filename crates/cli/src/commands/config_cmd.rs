//! `discovery config`: print the effective configuration.

use std::path::Path;

pub fn show(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    println!("# {}", config_path.display());
    println!("{}", config.redacted_toml()?);
    Ok(())
}
