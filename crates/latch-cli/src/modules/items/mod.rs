mod actions;
pub mod args;

pub(crate) use actions::handle_item_command;
