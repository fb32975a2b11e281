#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod engine;
pub mod local_store;
pub mod merge;
pub mod session;
pub mod settings;
pub mod tracker;
pub mod transport;

pub use crate::engine::{SyncEngine, SyncError, SyncOutcome};
pub use crate::local_store::{LocalVaultStore, StoreError};
pub use crate::merge::{merge_snapshots, merge_vaults, MergeError, MergeResult, MergeStats};
pub use crate::session::{SessionError, VaultSession};
pub use crate::settings::SyncSettings;
pub use crate::tracker::VaultMetadata;
pub use crate::transport::{DirectoryTransport, MemoryTransport, SyncTransport, TransportError};
