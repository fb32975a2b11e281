pub mod args;
mod config;
mod context;
pub mod types;

pub(crate) use config::{latch_dir, load_config, save_config, vault_dir};
pub(crate) use context::CommandContext;
