//! `config` command.

use anyhow::Context;
use rollcall_core::AppConfig;

/// Print the effective configuration, environment overrides included.
pub fn show(config: &AppConfig) -> anyhow::Result<()> {
    let path = AppConfig::config_path().context("failed to resolve config path")?;
    println!("# {}", path.display());
    print!("{}", render(config)?);
    Ok(())
}

/// Write the effective configuration to the config file.
pub fn init(config: &AppConfig) -> anyhow::Result<()> {
    config.save().context("failed to save configuration")?;
    let path = AppConfig::config_path().context("failed to resolve config path")?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn render(config: &AppConfig) -> anyhow::Result<String> {
    toml::to_string_pretty(config).context("failed to serialize configuration")
}
