use sqlx_core::from_row::FromRow;
use sqlx_core::row::Row;
use sqlx_sqlite::SqliteRow;
use uuid::Uuid;

use super::*;

fn decode_err<E>(err: E) -> sqlx_core::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx_core::Error::Decode(Box::new(err))
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, sqlx_core::Error> {
    match row.try_get::<String, _>(column) {
        Ok(value) => Uuid::parse_str(&value).map_err(decode_err),
        Err(_) => {
            let bytes: Vec<u8> = row.try_get(column)?;
            Uuid::from_slice(&bytes).map_err(decode_err)
        }
    }
}

fn parse_optional_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>, sqlx_core::Error> {
    let present: Option<Vec<u8>> = match row.try_get::<Option<String>, _>(column) {
        Ok(None) => return Ok(None),
        Ok(Some(value)) => return Uuid::parse_str(&value).map(Some).map_err(decode_err),
        Err(_) => row.try_get(column)?,
    };
    present
        .map(|bytes| Uuid::from_slice(&bytes).map_err(decode_err))
        .transpose()
}

fn parse_enum<T: TryFrom<i32, Error = EnumParseError>>(value: i32) -> Result<T, sqlx_core::Error> {
    T::try_from(value).map_err(decode_err)
}

fn parse_field_ref(row: &SqliteRow) -> Result<FieldRef, sqlx_core::Error> {
    let field_key: Option<String> = row.try_get("field_key")?;
    let definition_id = parse_optional_uuid(row, "field_definition_id")?;
    FieldRef::from_columns(field_key, definition_id).map_err(decode_err)
}

macro_rules! impl_from_row {
    ($ty:ty, $row:ident => $body:block) => {
        impl FromRow<'_, SqliteRow> for $ty {
            fn from_row($row: &SqliteRow) -> Result<Self, sqlx_core::Error> {
                $body
            }
        }
    };
}

impl_from_row!(Item, row => {
        let item_type: Option<i32> = row.try_get("item_type")?;
        Ok(Self {
            id: parse_uuid(row, "id")?,
            name: row.try_get("name")?,
            item_type: item_type.map(parse_enum).transpose()?,
            folder_id: parse_optional_uuid(row, "folder_id")?,
            logo_id: parse_optional_uuid(row, "logo_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
);

impl_from_row!(FieldValue, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            item_id: parse_uuid(row, "item_id")?,
            field: parse_field_ref(row)?,
            value: row.try_get("value")?,
            weight: row.try_get("weight")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(FieldDefinition, row => {
        let field_type: i32 = row.try_get("field_type")?;
        Ok(Self {
            id: parse_uuid(row, "id")?,
            label: row.try_get("label")?,
            field_type: parse_enum(field_type)?,
            is_multi_value: row.try_get("is_multi_value")?,
            enable_history: row.try_get("enable_history")?,
            weight: row.try_get("weight")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(FieldHistory, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            item_id: parse_uuid(row, "item_id")?,
            field: parse_field_ref(row)?,
            value_snapshot: row.try_get("value_snapshot")?,
            changed_at: row.try_get("changed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(Passkey, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            item_id: parse_uuid(row, "item_id")?,
            rp_id: row.try_get("rp_id")?,
            user_handle: row.try_get("user_handle")?,
            credential_blob: row.try_get("credential_blob")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(TotpCode, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            item_id: parse_uuid(row, "item_id")?,
            name: row.try_get("name")?,
            secret_key: row.try_get("secret_key")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(Attachment, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            item_id: parse_uuid(row, "item_id")?,
            filename: row.try_get("filename")?,
            blob: row.try_get("blob")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(Folder, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            name: row.try_get("name")?,
            parent_folder_id: parse_optional_uuid(row, "parent_folder_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(Logo, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            source: row.try_get("source")?,
            mime_type: row.try_get("mime_type")?,
            file_data: row.try_get("file_data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(Tag, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            name: row.try_get("name")?,
            color: row.try_get("color")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);

impl_from_row!(ItemTag, row => {
        Ok(Self {
            id: parse_uuid(row, "id")?,
            item_id: parse_uuid(row, "item_id")?,
            tag_id: parse_uuid(row, "tag_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
);
