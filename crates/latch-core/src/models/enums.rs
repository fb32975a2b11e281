use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub struct EnumParseError {
    enum_name: &'static str,
    value: String,
}

impl EnumParseError {
    pub fn new(enum_name: &'static str, value: impl Into<String>) -> Self {
        Self {
            enum_name,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} value: {}", self.enum_name, self.value)
    }
}

impl std::error::Error for EnumParseError {}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Login = 1,
    Alias = 2,
    CreditCard = 3,
    Note = 4,
}

impl ItemType {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Alias => "alias",
            Self::CreditCard => "credit_card",
            Self::Note => "note",
        }
    }
}

impl From<ItemType> for i32 {
    fn from(value: ItemType) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for ItemType {
    type Error = EnumParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Login),
            2 => Ok(Self::Alias),
            3 => Ok(Self::CreditCard),
            4 => Ok(Self::Note),
            _ => Err(EnumParseError::new("item_type", value.to_string())),
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = EnumParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "login" => Ok(Self::Login),
            "alias" => Ok(Self::Alias),
            "credit_card" | "card" => Ok(Self::CreditCard),
            "note" => Ok(Self::Note),
            _ => Err(EnumParseError::new("item_type", value)),
        }
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text = 1,
    Password = 2,
    Hidden = 3,
    Email = 4,
    Url = 5,
    Phone = 6,
    Date = 7,
    TextArea = 8,
}

impl FieldType {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<FieldType> for i32 {
    fn from(value: FieldType) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for FieldType {
    type Error = EnumParseError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Text),
            2 => Ok(Self::Password),
            3 => Ok(Self::Hidden),
            4 => Ok(Self::Email),
            5 => Ok(Self::Url),
            6 => Ok(Self::Phone),
            7 => Ok(Self::Date),
            8 => Ok(Self::TextArea),
            _ => Err(EnumParseError::new("field_type", value.to_string())),
        }
    }
}
