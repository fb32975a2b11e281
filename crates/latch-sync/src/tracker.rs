//! Dirty/mutation tracking.
//!
//! Every local write bumps `mutation_sequence`. A sync captures the sequence
//! before it starts and may only clear the dirty flag if the sequence is still
//! the same afterwards, so a write that raced with an upload is never lost.

use serde::{Deserialize, Serialize};

use latch_core::SyncState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VaultMetadata {
    pub server_revision: i64,
    pub mutation_sequence: i64,
    pub is_dirty: bool,
    #[serde(default)]
    pub is_offline: bool,
    /// Bumped on every blob write, local edit or sync alike.
    #[serde(default)]
    pub blob_generation: i64,
}

impl VaultMetadata {
    /// Records one local mutation and returns the new sequence.
    pub fn mark_dirty(&mut self) -> i64 {
        self.mutation_sequence += 1;
        self.is_dirty = true;
        self.mutation_sequence
    }

    pub fn record_blob_write(&mut self) -> i64 {
        self.blob_generation += 1;
        self.blob_generation
    }

    /// Clears the dirty flag and adopts `new_server_revision` only if nothing
    /// was mutated since `expected_sequence` was captured.
    pub fn compare_and_clear(&mut self, expected_sequence: i64, new_server_revision: i64) -> bool {
        if self.mutation_sequence != expected_sequence {
            return false;
        }
        self.is_dirty = false;
        self.server_revision = new_server_revision;
        true
    }

    #[must_use]
    pub fn sync_state(&self) -> SyncState {
        SyncState {
            is_dirty: self.is_dirty,
            mutation_sequence: self.mutation_sequence,
            server_revision: self.server_revision,
        }
    }
}
