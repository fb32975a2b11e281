use clap::Args;
use uuid::Uuid;

#[derive(Args)]
pub struct AddArgs {
    pub name: String,
    /// login, alias, card or note.
    #[arg(long = "type", default_value = "login")]
    pub item_type: String,
    /// `KEY=VALUE`; repeat a key for a multi-value field.
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: Uuid,
    #[arg(long)]
    pub name: Option<String>,
    /// Replaces every value of KEY; `KEY=` clears it.
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub trashed: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ItemIdArgs {
    pub id: Uuid,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub id: Uuid,
    pub field: String,
}
