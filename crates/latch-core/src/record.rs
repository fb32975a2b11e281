use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    Attachment, FieldDefinition, FieldHistory, FieldValue, Folder, Item, ItemTag, Logo, Passkey,
    Tag, TotpCode,
};

/// Lifecycle state of a syncable row, ordered from least to most final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordState {
    Active,
    Trashed,
    Deleted,
}

/// A row that must exist in the merged vault for a dependent row to survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    Item(Uuid),
    FieldDefinition(Uuid),
    Tag(Uuid),
}

/// Shape shared by every table that takes part in sync: a stable id, an
/// `updated_at` discriminator and a deletion state.
pub trait SyncRecord: Clone + PartialEq + Serialize {
    const TABLE: &'static str;

    fn id(&self) -> Uuid;
    fn updated_at(&self) -> DateTime<Utc>;
    fn state(&self) -> RecordState;

    fn parents(&self) -> Vec<ParentRef> {
        Vec::new()
    }
}

/// Stable digest of a row's full content, used to order otherwise tied rows.
pub fn record_digest<T: SyncRecord>(record: &T) -> Result<[u8; 32], serde_json::Error> {
    let bytes = serde_json::to_vec(record)?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

fn soft_state(is_deleted: bool) -> RecordState {
    if is_deleted {
        RecordState::Deleted
    } else {
        RecordState::Active
    }
}

impl SyncRecord for Item {
    const TABLE: &'static str = "items";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        if self.is_deleted {
            RecordState::Deleted
        } else if self.deleted_at.is_some() {
            RecordState::Trashed
        } else {
            RecordState::Active
        }
    }
}

impl SyncRecord for FieldValue {
    const TABLE: &'static str = "field_values";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }

    fn parents(&self) -> Vec<ParentRef> {
        let mut parents = vec![ParentRef::Item(self.item_id)];
        if let Some(definition_id) = self.field.definition_id() {
            parents.push(ParentRef::FieldDefinition(definition_id));
        }
        parents
    }
}

impl SyncRecord for FieldDefinition {
    const TABLE: &'static str = "field_definitions";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }
}

impl SyncRecord for FieldHistory {
    const TABLE: &'static str = "field_history";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }

    fn parents(&self) -> Vec<ParentRef> {
        let mut parents = vec![ParentRef::Item(self.item_id)];
        if let Some(definition_id) = self.field.definition_id() {
            parents.push(ParentRef::FieldDefinition(definition_id));
        }
        parents
    }
}

impl SyncRecord for Passkey {
    const TABLE: &'static str = "passkeys";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }

    fn parents(&self) -> Vec<ParentRef> {
        vec![ParentRef::Item(self.item_id)]
    }
}

impl SyncRecord for TotpCode {
    const TABLE: &'static str = "totp_codes";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }

    fn parents(&self) -> Vec<ParentRef> {
        vec![ParentRef::Item(self.item_id)]
    }
}

impl SyncRecord for Attachment {
    const TABLE: &'static str = "attachments";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }

    fn parents(&self) -> Vec<ParentRef> {
        vec![ParentRef::Item(self.item_id)]
    }
}

impl SyncRecord for Folder {
    const TABLE: &'static str = "folders";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }
}

impl SyncRecord for Logo {
    const TABLE: &'static str = "logos";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }
}

impl SyncRecord for Tag {
    const TABLE: &'static str = "tags";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }
}

impl SyncRecord for ItemTag {
    const TABLE: &'static str = "item_tags";

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn state(&self) -> RecordState {
        soft_state(self.is_deleted)
    }

    fn parents(&self) -> Vec<ParentRef> {
        vec![ParentRef::Item(self.item_id), ParentRef::Tag(self.tag_id)]
    }
}
