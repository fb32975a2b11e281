use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use latch_sync::SyncSettings;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub server_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync: SyncSettings,
}
