use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::{
    Attachment, FieldDefinition, FieldHistory, FieldValue, Folder, Item, ItemTag, Logo, Passkey,
    Tag, TotpCode,
};
use crate::record::SyncRecord;

pub type RecordSet<T> = BTreeMap<Uuid, T>;

pub fn record_set<T: SyncRecord>(rows: impl IntoIterator<Item = T>) -> RecordSet<T> {
    rows.into_iter().map(|row| (row.id(), row)).collect()
}

/// Every row of a vault image, soft-deleted and tombstoned rows included.
///
/// Relations are carried as ids; nothing here owns anything else, so the
/// folder/item/logo cycle is just three maps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaultSnapshot {
    pub schema_revision: i64,
    pub folders: RecordSet<Folder>,
    pub logos: RecordSet<Logo>,
    pub field_definitions: RecordSet<FieldDefinition>,
    pub tags: RecordSet<Tag>,
    pub items: RecordSet<Item>,
    pub field_values: RecordSet<FieldValue>,
    pub field_history: RecordSet<FieldHistory>,
    pub passkeys: RecordSet<Passkey>,
    pub totp_codes: RecordSet<TotpCode>,
    pub attachments: RecordSet<Attachment>,
    pub item_tags: RecordSet<ItemTag>,
}

impl VaultSnapshot {
    #[must_use]
    pub fn empty(schema_revision: i64) -> Self {
        Self {
            schema_revision,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.folders.len()
            + self.logos.len()
            + self.field_definitions.len()
            + self.tags.len()
            + self.items.len()
            + self.field_values.len()
            + self.field_history.len()
            + self.passkeys.len()
            + self.totp_codes.len()
            + self.attachments.len()
            + self.item_tags.len()
    }

    pub fn live_items(&self) -> impl Iterator<Item = &Item> {
        self.items.values().filter(|item| item.is_live())
    }

    pub fn active_field_values(&self, item_id: Uuid) -> impl Iterator<Item = &FieldValue> {
        self.field_values
            .values()
            .filter(move |value| value.item_id == item_id && !value.is_deleted)
    }
}
