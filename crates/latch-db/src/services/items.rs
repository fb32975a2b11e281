use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Duration;
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::{
    next_timestamp, now, FieldDefinition, FieldHistory, FieldInput, FieldRef, FieldValue, Item,
    ItemDetail, ItemInput, ServiceError, ServiceResult,
};

use crate::local::{
    AttachmentRepo, FieldDefinitionRepo, FieldHistoryRepo, FieldValueRepo, FolderRepo,
    ItemChanges, ItemRepo, ItemTagRepo, LogoRepo, PasskeyRepo, TotpCodeRepo,
};

use super::history::record_field_history;
use super::{db_error, validate_name, ItemStore};

/// One non-blank submitted value and its display position.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Submitted {
    value: String,
    weight: i64,
}

/// Groups submitted values per field, dropping blanks. Weight is the position
/// among the kept values.
fn group_submitted(fields: &[FieldInput]) -> BTreeMap<FieldRef, Vec<Submitted>> {
    let mut grouped: BTreeMap<FieldRef, Vec<Submitted>> = BTreeMap::new();
    let kept = fields
        .iter()
        .filter(|input| !input.value.trim().is_empty());
    for (position, input) in kept.enumerate() {
        grouped
            .entry(input.field.clone())
            .or_default()
            .push(Submitted {
                value: input.value.clone(),
                weight: position as i64,
            });
    }
    grouped
}

fn group_existing(rows: Vec<FieldValue>) -> BTreeMap<FieldRef, Vec<FieldValue>> {
    let mut grouped: BTreeMap<FieldRef, Vec<FieldValue>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.field.clone()).or_default().push(row);
    }
    grouped
}

fn to_detail(item: Item, fields: Vec<FieldValue>) -> ServiceResult<ItemDetail> {
    let item_type = item.item_type.ok_or_else(|| {
        ServiceError::new("item_corrupt", format!("{} has no item type", item.id))
    })?;
    Ok(ItemDetail {
        id: item.id,
        name: item.name.unwrap_or_default(),
        item_type,
        folder_id: item.folder_id,
        logo_id: item.logo_id,
        fields,
        created_at: item.created_at,
        updated_at: item.updated_at,
        deleted_at: item.deleted_at,
    })
}

impl<'a> ItemStore<'a> {
    pub async fn create_item(&self, input: ItemInput) -> ServiceResult<Uuid> {
        let name = validate_name(&input.name)?;
        let submitted = group_submitted(&input.fields);
        let mut tx = self.begin().await?;
        Self::check_item_references(&mut tx, input.folder_id, input.logo_id).await?;
        Self::load_definitions(&mut tx, &submitted).await?;

        let at = now();
        let item = Item {
            id: Uuid::now_v7(),
            name: Some(name),
            item_type: Some(input.item_type),
            folder_id: input.folder_id,
            logo_id: input.logo_id,
            created_at: at,
            updated_at: at,
            is_deleted: false,
            deleted_at: None,
        };
        ItemRepo::new(&mut tx).insert(&item).await.map_err(db_error)?;
        for (field, values) in &submitted {
            for value in values {
                Self::insert_field_value(&mut tx, item.id, field, value, at).await?;
            }
        }
        Self::commit(tx).await?;
        tracing::info!(
            event = "item_created",
            item_id = %item.id,
            fields = submitted.values().map(Vec::len).sum::<usize>()
        );
        Ok(item.id)
    }

    /// Applies `input` as the item's new state. Returns whether anything changed.
    pub async fn update_item(&self, id: Uuid, input: ItemInput) -> ServiceResult<bool> {
        let name = validate_name(&input.name)?;
        let submitted = group_submitted(&input.fields);
        let mut tx = self.begin().await?;
        let item = Self::load_mutable_item(&mut tx, id).await?;
        let definitions = Self::load_definitions(&mut tx, &submitted).await?;

        let mut changes = ItemChanges::default();
        if item.name.as_deref() != Some(name.as_str()) {
            changes.name = Some(name);
        }
        if item.item_type != Some(input.item_type) {
            changes.item_type = Some(input.item_type);
        }
        if item.folder_id != input.folder_id {
            changes.folder_id = Some(input.folder_id);
        }
        if item.logo_id != input.logo_id {
            changes.logo_id = Some(input.logo_id);
        }
        Self::check_item_references(
            &mut tx,
            changes.folder_id.flatten(),
            changes.logo_id.flatten(),
        )
        .await?;

        let at = next_timestamp(item.updated_at);
        let existing = group_existing(
            FieldValueRepo::new(&mut tx)
                .list_active_by_item(id)
                .await
                .map_err(db_error)?,
        );
        let touched: BTreeSet<&FieldRef> = existing.keys().chain(submitted.keys()).collect();
        let mut fields_changed = false;
        for field in touched {
            let old = existing.get(field).map(Vec::as_slice).unwrap_or_default();
            let new = submitted.get(field).map(Vec::as_slice).unwrap_or_default();

            let old_values: Vec<String> = old.iter().map(|row| row.value.clone()).collect();
            let values_differ = old_values.len() != new.len()
                || old_values
                    .iter()
                    .zip(new)
                    .any(|(current, next)| current != &next.value);
            if values_differ
                && !old_values.is_empty()
                && Self::history_enabled(&mut tx, field, &definitions).await?
            {
                record_field_history(&mut tx, id, field, &old_values, at).await?;
            }

            fields_changed |= Self::reconcile_field(&mut tx, id, field, old, new, at).await?;
        }

        let changed = fields_changed || !changes.is_empty();
        if changed {
            ItemRepo::new(&mut tx)
                .update_columns(id, &changes, at)
                .await
                .map_err(db_error)?;
            Self::commit(tx).await?;
            tracing::info!(event = "item_updated", item_id = %id, fields_changed);
        }
        Ok(changed)
    }

    pub async fn trash_item(&self, id: Uuid) -> ServiceResult<()> {
        let mut tx = self.begin().await?;
        let item = Self::load_mutable_item(&mut tx, id).await?;
        if item.is_trashed() {
            return Ok(());
        }
        let at = next_timestamp(item.updated_at);
        ItemRepo::new(&mut tx)
            .set_trashed_at(id, Some(at), at)
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        tracing::info!(event = "item_trashed", item_id = %id);
        Ok(())
    }

    pub async fn restore_item(&self, id: Uuid) -> ServiceResult<()> {
        let mut tx = self.begin().await?;
        let item = Self::load_mutable_item(&mut tx, id).await?;
        if !item.is_trashed() {
            return Ok(());
        }
        let at = next_timestamp(item.updated_at);
        ItemRepo::new(&mut tx)
            .set_trashed_at(id, None, at)
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        tracing::info!(event = "item_restored", item_id = %id);
        Ok(())
    }

    /// Hard-deletes the item's dependents and leaves a tombstone behind so
    /// the deletion propagates on the next sync.
    pub async fn permanently_delete_item(&self, id: Uuid) -> ServiceResult<()> {
        let mut tx = self.begin().await?;
        let item = ItemRepo::new(&mut tx)
            .get(id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ServiceError::not_found("item_not_found", id))?;
        if item.is_tombstone() {
            return Ok(());
        }

        FieldValueRepo::new(&mut tx)
            .delete_by_item(id)
            .await
            .map_err(db_error)?;
        FieldHistoryRepo::new(&mut tx)
            .delete_by_item(id)
            .await
            .map_err(db_error)?;
        PasskeyRepo::new(&mut tx)
            .delete_by_item(id)
            .await
            .map_err(db_error)?;
        TotpCodeRepo::new(&mut tx)
            .delete_by_item(id)
            .await
            .map_err(db_error)?;
        AttachmentRepo::new(&mut tx)
            .delete_by_item(id)
            .await
            .map_err(db_error)?;
        ItemTagRepo::new(&mut tx)
            .delete_by_item(id)
            .await
            .map_err(db_error)?;

        let at = next_timestamp(item.updated_at);
        let logo_id = item.logo_id;
        let tombstone = item.into_tombstone(at);
        ItemRepo::new(&mut tx)
            .write_tombstone(&tombstone)
            .await
            .map_err(db_error)?;
        if let Some(logo_id) = logo_id {
            Self::release_logo(&mut tx, logo_id, id).await?;
        }
        Self::commit(tx).await?;
        tracing::info!(event = "item_deleted_permanently", item_id = %id);
        Ok(())
    }

    /// Permanently deletes every item that sat in the trash longer than
    /// `retention`. Returns how many were removed.
    pub async fn purge_expired_trash(&self, retention: Duration) -> ServiceResult<usize> {
        let cutoff = now() - retention;
        let trashed = {
            let mut conn = self.pool.acquire().await.map_err(db_error)?;
            ItemRepo::new(&mut conn)
                .list_trashed()
                .await
                .map_err(db_error)?
        };
        let expired: Vec<Uuid> = trashed
            .into_iter()
            .filter(|item| item.deleted_at.is_some_and(|at| at <= cutoff))
            .map(|item| item.id)
            .collect();
        for id in &expired {
            self.permanently_delete_item(*id).await?;
        }
        if !expired.is_empty() {
            tracing::info!(event = "trash_purged", removed = expired.len());
        }
        Ok(expired.len())
    }

    pub async fn get_item(&self, id: Uuid) -> ServiceResult<ItemDetail> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let item = ItemRepo::new(&mut conn)
            .get(id)
            .await
            .map_err(db_error)?
            .filter(|item| !item.is_tombstone())
            .ok_or_else(|| ServiceError::not_found("item_not_found", id))?;
        let fields = FieldValueRepo::new(&mut conn)
            .list_active_by_item(id)
            .await
            .map_err(db_error)?;
        to_detail(item, fields)
    }

    pub async fn list_items(&self, include_trashed: bool) -> ServiceResult<Vec<ItemDetail>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let items = ItemRepo::new(&mut conn)
            .list_visible(include_trashed)
            .await
            .map_err(db_error)?;
        let mut details = Vec::with_capacity(items.len());
        for item in items {
            let fields = FieldValueRepo::new(&mut conn)
                .list_active_by_item(item.id)
                .await
                .map_err(db_error)?;
            details.push(to_detail(item, fields)?);
        }
        Ok(details)
    }

    /// Active history of one field, newest first.
    pub async fn list_field_history(
        &self,
        item_id: Uuid,
        field: &FieldRef,
    ) -> ServiceResult<Vec<FieldHistory>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let mut rows: Vec<FieldHistory> = FieldHistoryRepo::new(&mut conn)
            .list_active_by_item(item_id)
            .await
            .map_err(db_error)?
            .into_iter()
            .filter(|row| &row.field == field)
            .collect();
        rows.reverse();
        rows.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(rows)
    }

    async fn insert_field_value(
        conn: &mut SqliteConnection,
        item_id: Uuid,
        field: &FieldRef,
        submitted: &Submitted,
        at: chrono::DateTime<chrono::Utc>,
    ) -> ServiceResult<()> {
        let row = FieldValue {
            id: Uuid::now_v7(),
            item_id,
            field: field.clone(),
            value: submitted.value.clone(),
            weight: submitted.weight,
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        FieldValueRepo::new(conn)
            .insert(&row)
            .await
            .map_err(db_error)
    }

    /// Matches rows by position within the field. Returns whether any row
    /// was written.
    async fn reconcile_field(
        conn: &mut SqliteConnection,
        item_id: Uuid,
        field: &FieldRef,
        old: &[FieldValue],
        new: &[Submitted],
        at: chrono::DateTime<chrono::Utc>,
    ) -> ServiceResult<bool> {
        let mut changed = false;
        for index in 0..old.len().max(new.len()) {
            match (old.get(index), new.get(index)) {
                (Some(row), Some(next)) => {
                    if row.value != next.value || row.weight != next.weight {
                        FieldValueRepo::new(&mut *conn)
                            .update_value(
                                row.id,
                                &next.value,
                                next.weight,
                                next_timestamp(row.updated_at),
                            )
                            .await
                            .map_err(db_error)?;
                        changed = true;
                    }
                }
                (Some(row), None) => {
                    FieldValueRepo::new(&mut *conn)
                        .soft_delete(row.id, next_timestamp(row.updated_at))
                        .await
                        .map_err(db_error)?;
                    changed = true;
                }
                (None, Some(next)) => {
                    Self::insert_field_value(&mut *conn, item_id, field, next, at).await?;
                    changed = true;
                }
                (None, None) => {}
            }
        }
        Ok(changed)
    }

    /// Checks every custom field in `submitted` against its definition.
    async fn load_definitions(
        conn: &mut SqliteConnection,
        submitted: &BTreeMap<FieldRef, Vec<Submitted>>,
    ) -> ServiceResult<HashMap<Uuid, FieldDefinition>> {
        let mut definitions = HashMap::new();
        for (field, values) in submitted {
            match field {
                FieldRef::System(key) if key.trim().is_empty() => {
                    return Err(ServiceError::new("invalid_field", "empty field key"));
                }
                FieldRef::System(_) => {}
                FieldRef::Custom(definition_id) => {
                    let definition = FieldDefinitionRepo::new(&mut *conn)
                        .get(*definition_id)
                        .await
                        .map_err(db_error)?
                        .filter(|definition| !definition.is_deleted)
                        .ok_or_else(|| {
                            ServiceError::not_found("field_definition_not_found", *definition_id)
                        })?;
                    if values.len() > 1 && !definition.is_multi_value {
                        return Err(ServiceError::new(
                            "field_not_multi_value",
                            format!("{} accepts a single value", definition.label),
                        ));
                    }
                    definitions.insert(*definition_id, definition);
                }
            }
        }
        Ok(definitions)
    }

    async fn history_enabled(
        conn: &mut SqliteConnection,
        field: &FieldRef,
        known: &HashMap<Uuid, FieldDefinition>,
    ) -> ServiceResult<bool> {
        match field {
            FieldRef::System(_) => Ok(field.is_history_enabled_system_field()),
            FieldRef::Custom(definition_id) => {
                if let Some(definition) = known.get(definition_id) {
                    return Ok(definition.enable_history);
                }
                let definition = FieldDefinitionRepo::new(conn)
                    .get(*definition_id)
                    .await
                    .map_err(db_error)?;
                Ok(definition.is_some_and(|definition| definition.enable_history))
            }
        }
    }

    async fn check_item_references(
        conn: &mut SqliteConnection,
        folder_id: Option<Uuid>,
        logo_id: Option<Uuid>,
    ) -> ServiceResult<()> {
        if let Some(folder_id) = folder_id {
            FolderRepo::new(&mut *conn)
                .get(folder_id)
                .await
                .map_err(db_error)?
                .filter(|folder| !folder.is_deleted)
                .ok_or_else(|| ServiceError::not_found("folder_not_found", folder_id))?;
        }
        if let Some(logo_id) = logo_id {
            LogoRepo::new(&mut *conn)
                .get(logo_id)
                .await
                .map_err(db_error)?
                .filter(|logo| !logo.is_deleted)
                .ok_or_else(|| ServiceError::not_found("logo_not_found", logo_id))?;
        }
        Ok(())
    }

    /// Soft-deletes the logo once no other non-tombstoned item points at it.
    async fn release_logo(
        conn: &mut SqliteConnection,
        logo_id: Uuid,
        released_by: Uuid,
    ) -> ServiceResult<()> {
        let refs = ItemRepo::new(&mut *conn)
            .count_logo_references(logo_id, released_by)
            .await
            .map_err(db_error)?;
        if refs > 0 {
            return Ok(());
        }
        let Some(logo) = LogoRepo::new(&mut *conn)
            .get(logo_id)
            .await
            .map_err(db_error)?
        else {
            return Ok(());
        };
        if logo.is_deleted {
            return Ok(());
        }
        LogoRepo::new(conn)
            .soft_delete(logo_id, next_timestamp(logo.updated_at))
            .await
            .map_err(db_error)?;
        tracing::debug!(event = "logo_released", logo_id = %logo_id);
        Ok(())
    }
}
