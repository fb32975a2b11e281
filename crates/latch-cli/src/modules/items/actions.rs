use std::collections::BTreeSet;

use uuid::Uuid;

use latch_core::{FieldInput, FieldRef, ItemDetail, ItemInput, ItemType};

use crate::cli_args::{AddArgs, Command, EditArgs};
use crate::modules::system::CommandContext;

pub(crate) async fn handle_item_command(
    command: Command,
    ctx: &CommandContext,
) -> anyhow::Result<()> {
    let mut session = ctx.session().await?;
    let result = run(command, ctx, &mut session).await;
    session.close().await;
    result
}

async fn run(
    command: Command,
    ctx: &CommandContext,
    session: &mut latch_sync::VaultSession,
) -> anyhow::Result<()> {
    match command {
        Command::Add(args) => {
            let input = add_input(args)?;
            let id = session.create_item(input).await?;
            println!("{id}");
        }
        Command::Edit(args) => {
            let current = session.items().get_item(args.id).await?;
            let input = edit_input(&current, args)?;
            let changed = session.update_item(current.id, input).await?;
            println!("{}", if changed { "updated" } else { "unchanged" });
        }
        Command::List(args) => {
            let items = session.items().list_items(args.trashed).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in items {
                    let trashed = if item.deleted_at.is_some() { "\ttrashed" } else { "" };
                    println!(
                        "{}\t{}\t{}{trashed}",
                        item.id,
                        item.item_type.as_str(),
                        item.name
                    );
                }
            }
        }
        Command::Show(args) => {
            let item = session.items().get_item(args.id).await?;
            print_item(&item);
        }
        Command::Trash(args) => {
            session.trash_item(args.id).await?;
            println!("trashed {}", args.id);
        }
        Command::Restore(args) => {
            session.restore_item(args.id).await?;
            println!("restored {}", args.id);
        }
        Command::Delete(args) => {
            session.permanently_delete_item(args.id).await?;
            println!("deleted {}", args.id);
        }
        Command::Purge => {
            let purged = session
                .purge_expired_trash(ctx.config.sync.trash_retention())
                .await?;
            println!("purged {purged}");
        }
        Command::History(args) => {
            let field = parse_field_ref(&args.field)?;
            let rows = session.items().list_field_history(args.id, &field).await?;
            for row in rows {
                println!(
                    "{}\t{}",
                    row.changed_at.to_rfc3339(),
                    row.values()?.join(", ")
                );
            }
        }
        _ => anyhow::bail!("not an item command"),
    }
    Ok(())
}

fn print_item(item: &ItemDetail) {
    println!("id: {}", item.id);
    println!("name: {}", item.name);
    println!("type: {}", item.item_type.as_str());
    if let Some(folder) = item.folder_id {
        println!("folder: {folder}");
    }
    if let Some(deleted_at) = item.deleted_at {
        println!("trashed: {}", deleted_at.to_rfc3339());
    }
    for value in &item.fields {
        println!("{}: {}", value.field, value.value);
    }
}

fn parse_item_type(value: &str) -> anyhow::Result<ItemType> {
    value
        .trim()
        .to_ascii_lowercase()
        .parse::<ItemType>()
        .map_err(|err| anyhow::anyhow!("{err}"))
}

pub(crate) fn parse_field_ref(key: &str) -> anyhow::Result<FieldRef> {
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("field key is empty");
    }
    match key.strip_prefix("custom:") {
        Some(id) => Ok(FieldRef::Custom(Uuid::parse_str(id)?)),
        None => Ok(FieldRef::system(key)),
    }
}

pub(crate) fn parse_field(raw: &str) -> anyhow::Result<FieldInput> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got {raw}"))?;
    Ok(FieldInput {
        field: parse_field_ref(key)?,
        value: value.to_string(),
    })
}

fn add_input(args: AddArgs) -> anyhow::Result<ItemInput> {
    let mut input = ItemInput::new(args.name, parse_item_type(&args.item_type)?);
    for raw in &args.fields {
        input.fields.push(parse_field(raw)?);
    }
    Ok(input)
}

/// Keeps every field the user did not mention and replaces the ones given.
fn edit_input(current: &ItemDetail, args: EditArgs) -> anyhow::Result<ItemInput> {
    let replacements = args
        .fields
        .iter()
        .map(|raw| parse_field(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let replaced: BTreeSet<&FieldRef> = replacements.iter().map(|input| &input.field).collect();

    let mut fields: Vec<FieldInput> = current
        .fields
        .iter()
        .filter(|value| !replaced.contains(&value.field))
        .map(|value| FieldInput {
            field: value.field.clone(),
            value: value.value.clone(),
        })
        .collect();
    fields.extend(replacements.iter().cloned());

    Ok(ItemInput {
        name: args.name.unwrap_or_else(|| current.name.clone()),
        item_type: current.item_type,
        folder_id: current.folder_id,
        logo_id: current.logo_id,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_keys_parse_as_system_or_custom() {
        assert_eq!(
            parse_field("login.username=alice").expect("field"),
            FieldInput::system("login.username", "alice")
        );
        let id = Uuid::now_v7();
        assert_eq!(
            parse_field(&format!("custom:{id}=x")).expect("field"),
            FieldInput::custom(id, "x")
        );
        assert!(parse_field("no-separator").is_err());
        assert!(parse_field("=value").is_err());
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let field = parse_field("login.password=a=b").expect("field");
        assert_eq!(field.value, "a=b");
    }

    #[test]
    fn item_type_accepts_card_alias() {
        assert_eq!(parse_item_type("Card").expect("type"), ItemType::CreditCard);
        assert!(parse_item_type("folder").is_err());
    }
}
