use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use contact_directory_api::{ContactDirectoryApi, API_CONTRACT_VERSION};
use contact_directory_core::{CreateContactRequest, UpdateContactRequest};
use serde_json::Value;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "contacts")]
#[command(about = "Contact directory admin CLI")]
struct Cli {
    #[arg(long, env = "CONTACTS_DB", default_value = "./contacts.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    Contact {
        #[command(subcommand)]
        command: ContactCommand,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum ContactCommand {
    Add(AddArgs),
    List(ListArgs),
    Show(IdArgs),
    Update(UpdateArgs),
    Delete(IdArgs),
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Only list contacts whose phone starts with "(<code>)".
    #[arg(long)]
    area_code: Option<String>,
}

#[derive(Debug, Args)]
struct IdArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = ContactDirectoryApi::new(cli.db);
    match cli.command {
        Command::Db { command } => run_db(command, &api),
        Command::Contact { command } => run_contact(command, &api),
    }
}

fn run_db(command: DbCommand, api: &ContactDirectoryApi) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            let status = api.schema_status()?;
            emit_json(serde_json::json!({
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions,
                "up_to_date": status.pending_versions.is_empty()
            }))
        }
        DbCommand::Migrate(args) => {
            let result = api.migrate(args.dry_run)?;
            let mut value = serde_json::to_value(result)?;
            if let Value::Object(object) = &mut value {
                object.insert(
                    "api_contract_version".to_string(),
                    Value::String(API_CONTRACT_VERSION.to_string()),
                );
            }
            emit_json(value)
        }
    }
}

fn run_contact(command: ContactCommand, api: &ContactDirectoryApi) -> Result<()> {
    match command {
        ContactCommand::Add(args) => {
            let record = api.create_contact(CreateContactRequest {
                name: args.name,
                email: args.email,
                phone: args.phone,
            })?;
            emit_json(serde_json::json!({ "contact": record }))
        }
        ContactCommand::List(args) => {
            let records = match args.area_code.as_deref() {
                Some(code) => api.list_contacts_by_area_code(code)?,
                None => api.list_contacts()?,
            };
            emit_json(serde_json::json!({
                "area_code": args.area_code,
                "count": records.len(),
                "contacts": records
            }))
        }
        ContactCommand::Show(args) => {
            let record = api.get_contact(&args.id)?;
            emit_json(serde_json::json!({ "contact": record }))
        }
        ContactCommand::Update(args) => {
            let record = api.update_contact(
                &args.id,
                UpdateContactRequest {
                    name: args.name.into(),
                    email: args.email.into(),
                    phone: args.phone.into(),
                },
            )?;
            emit_json(serde_json::json!({ "contact": record }))
        }
        ContactCommand::Delete(args) => {
            let record = api.delete_contact(&args.id)?;
            emit_json(serde_json::json!({ "deleted": record }))
        }
    }
}
