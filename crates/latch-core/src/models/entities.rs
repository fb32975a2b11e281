use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{FieldType, ItemType};
use super::field::FieldRef;

/// A credential record.
///
/// Three lifecycle states share one row: active, trashed (`deleted_at` set,
/// restorable) and tombstoned (`is_deleted`, content columns cleared). The
/// tombstone stays in the vault so the deletion itself reaches other devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: Option<String>,
    pub item_type: Option<ItemType>,
    pub folder_id: Option<Uuid>,
    pub logo_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Item {
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.is_deleted
    }

    #[must_use]
    pub fn is_trashed(&self) -> bool {
        !self.is_deleted && self.deleted_at.is_some()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.is_deleted && self.deleted_at.is_none()
    }

    /// Clears every content column and marks the row deleted.
    pub fn into_tombstone(self, at: DateTime<Utc>) -> Self {
        Self {
            id: self.id,
            name: None,
            item_type: None,
            folder_id: None,
            logo_id: None,
            created_at: self.created_at,
            updated_at: at,
            is_deleted: true,
            deleted_at: Some(self.deleted_at.unwrap_or(at)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub id: Uuid,
    pub item_id: Uuid,
    pub field: FieldRef,
    pub value: String,
    pub weight: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: Uuid,
    pub label: String,
    pub field_type: FieldType,
    pub is_multi_value: bool,
    pub enable_history: bool,
    pub weight: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// Append-only snapshot of a field's previous value set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHistory {
    pub id: Uuid,
    pub item_id: Uuid,
    pub field: FieldRef,
    /// JSON array of the values the field held before the change.
    pub value_snapshot: String,
    pub changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl FieldHistory {
    pub fn values(&self) -> Result<Vec<String>, serde_json::Error> {
        serde_json::from_str(&self.value_snapshot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passkey {
    pub id: Uuid,
    pub item_id: Uuid,
    pub rp_id: String,
    pub user_handle: Vec<u8>,
    pub credential_blob: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpCode {
    pub id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    pub secret_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub item_id: Uuid,
    pub filename: String,
    pub blob: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub parent_folder_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// Icon shared by every item of the same source (usually a domain).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logo {
    pub id: Uuid,
    pub source: String,
    pub mime_type: Option<String>,
    pub file_data: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTag {
    pub id: Uuid,
    pub item_id: Uuid,
    pub tag_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}
