pub mod items;
pub mod sync;
pub mod system;
