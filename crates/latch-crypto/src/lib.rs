#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod cipher;
pub mod envelope;
pub mod kdf;

pub use crate::cipher::*;
pub use crate::envelope::*;
pub use crate::kdf::*;
