use std::fs;
use std::path::{Path, PathBuf};

use super::types::CliConfig;

pub(crate) fn latch_dir(home: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(home) = home {
        return Ok(home.join(".latch"));
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("HOME is not set"))?;
    Ok(Path::new(&home).join(".latch"))
}

fn config_path(dir: &Path) -> PathBuf {
    dir.join("config.json")
}

pub(crate) fn vault_dir(dir: &Path) -> PathBuf {
    dir.join("vault")
}

pub(crate) fn load_config(dir: &Path) -> anyhow::Result<CliConfig> {
    let path = config_path(dir);
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    let config = serde_json::from_str(&contents)?;
    Ok(config)
}

pub(crate) fn save_config(dir: &Path, config: &CliConfig) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(config_path(dir), contents)?;
    Ok(())
}
