mod actions;
pub mod args;

pub(crate) use actions::{handle_create, handle_logout, handle_status, handle_sync, handle_upgrade};
