//! Folders, custom field definitions, tags and logos.

use uuid::Uuid;

use latch_core::{
    next_timestamp, now, FieldDefinition, FieldDefinitionInput, Folder, ItemTag, Logo,
    ServiceError, ServiceResult, Tag,
};

use crate::local::{
    FieldDefinitionRepo, FolderRepo, ItemChanges, ItemRepo, ItemTagRepo, LogoRepo, TagRepo,
};

use super::{db_error, validate_name, ItemStore};

impl<'a> ItemStore<'a> {
    pub async fn create_folder(&self, name: &str, parent: Option<Uuid>) -> ServiceResult<Uuid> {
        let name = validate_name(name)?;
        let mut tx = self.begin().await?;
        if let Some(parent) = parent {
            Self::load_live_folder(&mut tx, parent).await?;
        }
        let at = now();
        let folder = Folder {
            id: Uuid::now_v7(),
            name,
            parent_folder_id: parent,
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        FolderRepo::new(&mut tx)
            .insert(&folder)
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        tracing::info!(event = "folder_created", folder_id = %folder.id);
        Ok(folder.id)
    }

    pub async fn rename_folder(&self, id: Uuid, name: &str) -> ServiceResult<()> {
        let name = validate_name(name)?;
        let mut tx = self.begin().await?;
        let folder = Self::load_live_folder(&mut tx, id).await?;
        if folder.name == name {
            return Ok(());
        }
        FolderRepo::new(&mut tx)
            .rename(id, &name, next_timestamp(folder.updated_at))
            .await
            .map_err(db_error)?;
        Self::commit(tx).await
    }

    /// Soft-deletes the folder, moves its items to the root and its child
    /// folders up one level.
    pub async fn delete_folder(&self, id: Uuid) -> ServiceResult<()> {
        let mut tx = self.begin().await?;
        let folder = Self::load_live_folder(&mut tx, id).await?;

        let items = ItemRepo::new(&mut tx)
            .list_by_folder(id)
            .await
            .map_err(db_error)?;
        let detach = ItemChanges {
            folder_id: Some(None),
            ..ItemChanges::default()
        };
        for item in &items {
            ItemRepo::new(&mut tx)
                .update_columns(item.id, &detach, next_timestamp(item.updated_at))
                .await
                .map_err(db_error)?;
        }

        let children: Vec<Folder> = FolderRepo::new(&mut tx)
            .list_all()
            .await
            .map_err(db_error)?
            .into_iter()
            .filter(|child| !child.is_deleted && child.parent_folder_id == Some(id))
            .collect();
        for child in &children {
            FolderRepo::new(&mut tx)
                .set_parent(
                    child.id,
                    folder.parent_folder_id,
                    next_timestamp(child.updated_at),
                )
                .await
                .map_err(db_error)?;
        }

        FolderRepo::new(&mut tx)
            .soft_delete(id, next_timestamp(folder.updated_at))
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        tracing::info!(
            event = "folder_deleted",
            folder_id = %id,
            detached_items = items.len(),
            reparented = children.len()
        );
        Ok(())
    }

    pub async fn list_folders(&self) -> ServiceResult<Vec<Folder>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let folders = FolderRepo::new(&mut conn)
            .list_all()
            .await
            .map_err(db_error)?;
        Ok(folders.into_iter().filter(|f| !f.is_deleted).collect())
    }

    pub async fn create_field_definition(
        &self,
        input: FieldDefinitionInput,
    ) -> ServiceResult<Uuid> {
        let label = validate_name(&input.label)?;
        let mut tx = self.begin().await?;
        let weight = FieldDefinitionRepo::new(&mut tx)
            .list_all()
            .await
            .map_err(db_error)?
            .iter()
            .filter(|definition| !definition.is_deleted)
            .count() as i64;
        let at = now();
        let definition = FieldDefinition {
            id: Uuid::now_v7(),
            label,
            field_type: input.field_type,
            is_multi_value: input.is_multi_value,
            enable_history: input.enable_history,
            weight,
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        FieldDefinitionRepo::new(&mut tx)
            .insert(&definition)
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        tracing::info!(event = "field_definition_created", definition_id = %definition.id);
        Ok(definition.id)
    }

    pub async fn list_field_definitions(&self) -> ServiceResult<Vec<FieldDefinition>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let definitions = FieldDefinitionRepo::new(&mut conn)
            .list_all()
            .await
            .map_err(db_error)?;
        Ok(definitions
            .into_iter()
            .filter(|definition| !definition.is_deleted)
            .collect())
    }

    pub async fn create_tag(&self, name: &str, color: Option<String>) -> ServiceResult<Uuid> {
        let name = validate_name(name)?;
        let mut tx = self.begin().await?;
        let at = now();
        let tag = Tag {
            id: Uuid::now_v7(),
            name,
            color,
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        TagRepo::new(&mut tx).insert(&tag).await.map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(tag.id)
    }

    pub async fn list_tags(&self) -> ServiceResult<Vec<Tag>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let tags = TagRepo::new(&mut conn).list_all().await.map_err(db_error)?;
        Ok(tags.into_iter().filter(|tag| !tag.is_deleted).collect())
    }

    /// Links a tag to an item. Returns false when the link already exists.
    pub async fn tag_item(&self, item_id: Uuid, tag_id: Uuid) -> ServiceResult<bool> {
        let mut tx = self.begin().await?;
        Self::load_mutable_item(&mut tx, item_id).await?;
        TagRepo::new(&mut tx)
            .get(tag_id)
            .await
            .map_err(db_error)?
            .filter(|tag| !tag.is_deleted)
            .ok_or_else(|| ServiceError::not_found("tag_not_found", tag_id))?;
        if ItemTagRepo::new(&mut tx)
            .find_active(item_id, tag_id)
            .await
            .map_err(db_error)?
            .is_some()
        {
            return Ok(false);
        }
        let at = now();
        let link = ItemTag {
            id: Uuid::now_v7(),
            item_id,
            tag_id,
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        ItemTagRepo::new(&mut tx)
            .insert(&link)
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(true)
    }

    pub async fn untag_item(&self, item_id: Uuid, tag_id: Uuid) -> ServiceResult<bool> {
        let mut tx = self.begin().await?;
        let Some(link) = ItemTagRepo::new(&mut tx)
            .find_active(item_id, tag_id)
            .await
            .map_err(db_error)?
        else {
            return Ok(false);
        };
        ItemTagRepo::new(&mut tx)
            .soft_delete(link.id, next_timestamp(link.updated_at))
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(true)
    }

    pub async fn list_item_tags(&self, item_id: Uuid) -> ServiceResult<Vec<Tag>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let links = ItemTagRepo::new(&mut conn)
            .list_active_by_item(item_id)
            .await
            .map_err(db_error)?;
        let mut tags = Vec::with_capacity(links.len());
        for link in links {
            if let Some(tag) = TagRepo::new(&mut conn)
                .get(link.tag_id)
                .await
                .map_err(db_error)?
                .filter(|tag| !tag.is_deleted)
            {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    /// Returns the live logo registered for `source`, creating it if needed.
    pub async fn upsert_logo(
        &self,
        source: &str,
        mime_type: Option<String>,
        file_data: Option<Vec<u8>>,
    ) -> ServiceResult<Uuid> {
        let source = source.trim().to_ascii_lowercase();
        if source.is_empty() {
            return Err(ServiceError::new("invalid_logo", "logo source must not be empty"));
        }
        let mut tx = self.begin().await?;
        if let Some(existing) = LogoRepo::new(&mut tx)
            .find_live_by_source(&source)
            .await
            .map_err(db_error)?
        {
            return Ok(existing.id);
        }
        let at = now();
        let logo = Logo {
            id: Uuid::now_v7(),
            source,
            mime_type,
            file_data,
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        LogoRepo::new(&mut tx).insert(&logo).await.map_err(db_error)?;
        Self::commit(tx).await?;
        tracing::debug!(event = "logo_created", logo_id = %logo.id);
        Ok(logo.id)
    }

    pub async fn get_logo(&self, id: Uuid) -> ServiceResult<Logo> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        LogoRepo::new(&mut conn)
            .get(id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ServiceError::not_found("logo_not_found", id))
    }

    async fn load_live_folder(
        conn: &mut sqlx_sqlite::SqliteConnection,
        id: Uuid,
    ) -> ServiceResult<Folder> {
        FolderRepo::new(conn)
            .get(id)
            .await
            .map_err(db_error)?
            .filter(|folder| !folder.is_deleted)
            .ok_or_else(|| ServiceError::not_found("folder_not_found", id))
    }
}
