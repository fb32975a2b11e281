//! Wire and message shapes exchanged with the sync server and with local
//! UI/autofill collaborators.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub server_version: String,
    pub vault_revision: i64,
    pub srp_salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultDownload {
    pub blob: Vec<u8>,
    pub current_revision_number: i64,
    #[serde(default)]
    pub public_email_domain_list: Vec<String>,
    #[serde(default)]
    pub private_email_domain_list: Vec<String>,
    #[serde(default)]
    pub hidden_private_email_domain_list: Vec<String>,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum UploadStatus {
    Accepted = 0,
    Rejected = 1,
    Outdated = 2,
}

impl From<UploadStatus> for i32 {
    fn from(value: UploadStatus) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for UploadStatus {
    type Error = crate::EnumParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::Rejected),
            2 => Ok(Self::Outdated),
            _ => Err(crate::EnumParseError::new(
                "upload_status",
                value.to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub blob: Vec<u8>,
    /// Revision the blob was built on; the server answers `Outdated` when it moved on.
    pub current_revision_number: i64,
    pub mutation_seq_at_start: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub status: UploadStatus,
    pub new_revision_number: i64,
    pub mutation_seq_at_start: i64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreVaultRequest {
    pub blob: Vec<u8>,
    #[serde(default)]
    pub mark_dirty: bool,
    #[serde(default)]
    pub server_revision: Option<i64>,
    #[serde(default)]
    pub expected_mutation_seq: Option<i64>,
    /// Blob generation the writer's working copy was loaded from; the store
    /// refuses the write when another blob landed in between.
    #[serde(default)]
    pub expected_generation: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreVaultResponse {
    pub success: bool,
    pub mutation_sequence: i64,
    pub generation: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub is_dirty: bool,
    pub mutation_sequence: i64,
    pub server_revision: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkCleanRequest {
    pub mutation_seq_at_start: i64,
    pub new_server_revision: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_status_uses_numeric_wire_values() {
        let json = serde_json::to_string(&UploadStatus::Outdated).expect("serialize");
        assert_eq!(json, "2");
        let parsed: UploadStatus = serde_json::from_str("0").expect("deserialize");
        assert_eq!(parsed, UploadStatus::Accepted);
        assert!(serde_json::from_str::<UploadStatus>("7").is_err());
    }

    #[test]
    fn store_request_defaults_optional_fields() {
        let request: StoreVaultRequest =
            serde_json::from_str(r#"{"blob":[1,2,3]}"#).expect("deserialize");
        assert_eq!(request.blob, vec![1, 2, 3]);
        assert!(!request.mark_dirty);
        assert!(request.server_revision.is_none());
        assert!(request.expected_mutation_seq.is_none());
        assert!(request.expected_generation.is_none());
    }
}
