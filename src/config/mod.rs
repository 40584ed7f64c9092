mod types;

pub use types::*;

use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::info;
pub fn load_from(path: &Path) -> Result<BackupConfig> {
    info!("Loading configuration from {:?}", path);
    let contents = fs::read_to_string(path)?;
    let config: BackupConfig = toml::from_str(&contents)?;
    Ok(config)
}
pub fn save_to(config: &BackupConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            info!("Creating config directory: {:?}", parent);
            fs::create_dir_all(parent)?;
        }
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(path, contents)?;
    info!("Configuration saved to {:?}", path);
    Ok(())
}
