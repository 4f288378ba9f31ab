//! Configuration command handlers.
//!
//! Handles `init` and `config`.

use agentsnap_core::{BackupService, Config, ConfigError, CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Handle `agentsnap init`: write a config and prepare the destination.
pub async fn handle_init(
    config_path: &Path,
    sources: Vec<PathBuf>,
    destination: PathBuf,
    force: bool,
) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    let config = Config {
        sources,
        destination: Some(destination),
        ..Default::default()
    };
    config.validate().map_err(CoreError::from)?;
    config.save(config_path).await?;

    let service = BackupService::open(config).await?;
    println!("Wrote {}", config_path.display());
    println!("Snapshots will be stored in {}", service.destination().display());
    Ok(())
}

/// Handle `agentsnap config`: print the effective config and whether it is valid.
pub fn show_config(config_path: &Path, config: CoreResult<Config>) -> anyhow::Result<()> {
    let config = match config {
        Ok(config) => config,
        Err(CoreError::Config(ConfigError::NotFound { .. })) => {
            println!("No config file at {}", config_path.display());
            println!("Run `agentsnap init --source <dir> --destination <dir>` to create one.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Config file: {}", config_path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    match config.validate() {
        Ok(()) => println!("Config is valid."),
        Err(e) => println!("Config is invalid: {e}"),
    }
    Ok(())
}
