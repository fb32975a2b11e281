mod entities;
mod enums;
mod field;
#[cfg(feature = "sqlite")]
mod from_row;

pub use entities::*;
pub use enums::*;
pub use field::*;
