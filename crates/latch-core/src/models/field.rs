use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::HISTORY_ENABLED_SYSTEM_FIELDS;

/// Which field a value belongs to: a built-in key or a custom definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum FieldRef {
    System(String),
    Custom(Uuid),
}

impl FieldRef {
    pub fn system(key: impl Into<String>) -> Self {
        Self::System(key.into())
    }

    #[must_use]
    pub fn system_key(&self) -> Option<&str> {
        match self {
            Self::System(key) => Some(key.as_str()),
            Self::Custom(_) => None,
        }
    }

    #[must_use]
    pub fn definition_id(&self) -> Option<Uuid> {
        match self {
            Self::System(_) => None,
            Self::Custom(id) => Some(*id),
        }
    }

    /// Builds a reference from the two nullable storage columns.
    /// Exactly one of them must be set.
    pub fn from_columns(
        field_key: Option<String>,
        field_definition_id: Option<Uuid>,
    ) -> Result<Self, FieldRefError> {
        match (field_key, field_definition_id) {
            (Some(key), None) if !key.is_empty() => Ok(Self::System(key)),
            (None, Some(id)) => Ok(Self::Custom(id)),
            (Some(_), Some(_)) => Err(FieldRefError::Ambiguous),
            _ => Err(FieldRefError::Missing),
        }
    }

    /// Whether a system field keeps history. Custom fields decide through
    /// their definition's `enable_history` flag.
    #[must_use]
    pub fn is_history_enabled_system_field(&self) -> bool {
        match self {
            Self::System(key) => HISTORY_ENABLED_SYSTEM_FIELDS.contains(&key.as_str()),
            Self::Custom(_) => false,
        }
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System(key) => write!(f, "{key}"),
            Self::Custom(id) => write!(f, "custom:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRefError {
    Missing,
    Ambiguous,
}

impl std::fmt::Display for FieldRefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "field value has neither a field key nor a definition"),
            Self::Ambiguous => write!(f, "field value has both a field key and a definition"),
        }
    }
}

impl std::error::Error for FieldRefError {}
