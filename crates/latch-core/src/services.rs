use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FieldRef, FieldType, FieldValue, ItemType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceError {
    pub kind: String,
    pub message: String,
}

impl ServiceError {
    #[must_use]
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(kind: &str, id: Uuid) -> Self {
        Self::new(kind, format!("{id} not found"))
    }

    #[must_use]
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ServiceError {}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One submitted value. Repeating the same `field` produces a multi-value
/// field; the n-th occurrence is matched against the n-th stored row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInput {
    pub field: FieldRef,
    pub value: String,
}

impl FieldInput {
    pub fn system(key: &str, value: impl Into<String>) -> Self {
        Self {
            field: FieldRef::system(key),
            value: value.into(),
        }
    }

    pub fn custom(definition_id: Uuid, value: impl Into<String>) -> Self {
        Self {
            field: FieldRef::Custom(definition_id),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInput {
    pub name: String,
    pub item_type: ItemType,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub logo_id: Option<Uuid>,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

impl ItemInput {
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            item_type,
            folder_id: None,
            logo_id: None,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldInput) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub id: Uuid,
    pub name: String,
    pub item_type: ItemType,
    pub folder_id: Option<Uuid>,
    pub logo_id: Option<Uuid>,
    pub fields: Vec<FieldValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ItemDetail {
    /// Active values of one field in display order.
    pub fn values_of(&self, field: &FieldRef) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|value| &value.field == field)
            .map(|value| value.value.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinitionInput {
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub is_multi_value: bool,
    #[serde(default)]
    pub enable_history: bool,
}
