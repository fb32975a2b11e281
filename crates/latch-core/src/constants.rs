/// Schema revision written by the newest migration this client ships.
pub const LATEST_SCHEMA_REVISION: i64 = 1;

/// Metadata key holding the schema revision inside every vault image.
pub const SCHEMA_REVISION_KEY: &str = "schema_revision";

/// History rows kept per (item, field); older rows are soft-deleted.
pub const MAX_FIELD_HISTORY: usize = 10;

/// Major version of the sync API this client speaks.
pub const SUPPORTED_SERVER_API_MAJOR: u64 = 1;

pub mod system_fields {
    pub const LOGIN_USERNAME: &str = "login.username";
    pub const LOGIN_PASSWORD: &str = "login.password";
    pub const LOGIN_EMAIL: &str = "login.email";
    pub const LOGIN_URL: &str = "login.url";
    pub const NOTES_CONTENT: &str = "notes.content";
    pub const CARD_NUMBER: &str = "card.number";
    pub const CARD_CVV: &str = "card.cvv";
    pub const ALIAS_EMAIL: &str = "alias.email";
}

/// System fields whose previous values are kept as history.
pub const HISTORY_ENABLED_SYSTEM_FIELDS: &[&str] = &[system_fields::LOGIN_PASSWORD];
