use airtable_rs::config::Config;
use airtable_rs::{Api, Fields, ListOptions, WriteOptions};
use anyhow::{anyhow, bail, Context, Result};
use crossterm::style::Stylize;
use serde_json::Value;

mod table_display;

use table_display::{display_records, export_to_csv};

fn print_help() {
    println!("{}", "airtable - command line client for the Airtable API".blue().bold());
    println!();
    println!("{}", "Usage:".yellow());
    println!("  airtable [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("{}", "Commands:".yellow());
    println!("  {} <base> <table>                 - List records", "list".green());
    println!("  {} <base> <table> <record>         - Show one record", "get".green());
    println!("  {} <base> <table> <json>        - Create a record", "create".green());
    println!("  {} <base> <table> <record> <json> - Update a record", "update".green());
    println!("  {} <base> <table> <record>...   - Delete records", "delete".green());
    println!("  {}                              - Show the token's user", "whoami".green());
    println!();
    println!("{}", "Options:".yellow());
    println!("  {}     - API key (else AIRTABLE_API_KEY, then config)", "--api-key KEY".green());
    println!("  {}         - Debug logging to stderr", "--verbose".green());
    println!("  {}            - Print raw JSON", "--json".green());
    println!("  {}      - Export listed records to CSV", "--csv FILE".green());
    println!("  {}      - Restrict listing to a view", "--view NAME".green());
    println!("  {}   - filterByFormula expression", "--formula EXPR".green());
    println!("  {}   - Stop after N records", "--max-records N".green());
    println!("  {}    - Only return this field (repeatable)", "--field NAME".green());
    println!("  {}    - Sort by field, '-' prefix descends (repeatable)", "--sort NAME".green());
    println!("  {}        - Let Airtable convert values", "--typecast".green());
    println!("  {}         - Update with PUT, clearing omitted fields", "--replace".green());
    println!("  {} - Generate config file with defaults", "--generate-config".green());
    println!("  {}            - Show this help", "--help".green());
    println!();
    println!("{}", "Examples:".yellow());
    println!("  airtable list appXXXXXXXXXXXXXX Contacts --sort -Name --max-records 10");
    println!("  airtable create appXXXXXXXXXXXXXX Contacts '{{\"Name\": \"Alice\"}}'");
    println!();
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    List { base: String, table: String },
    Get { base: String, table: String, record_id: String },
    Create { base: String, table: String, fields: Fields },
    Update { base: String, table: String, record_id: String, fields: Fields },
    Delete { base: String, table: String, record_ids: Vec<String> },
    WhoAmI,
    Help,
    GenerateConfig,
}

#[derive(Debug, Clone, PartialEq)]
struct CliArgs {
    command: Command,
    api_key: Option<String>,
    verbose: bool,
    json: bool,
    csv: Option<String>,
    list_options: ListOptions,
    typecast: bool,
    replace: bool,
}

fn parse_fields(raw: &str) -> Result<Fields> {
    match serde_json::from_str::<Value>(raw).with_context(|| format!("Invalid JSON: {}", raw))? {
        Value::Object(map) => Ok(map),
        other => bail!("Fields must be a JSON object, got {}", other),
    }
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut positional: Vec<String> = Vec::new();
    let mut api_key = None;
    let mut verbose = false;
    let mut json = false;
    let mut csv = None;
    let mut list_options = ListOptions::new();
    let mut typecast = false;
    let mut replace = false;
    let mut help = false;
    let mut generate_config = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--help" | "-h" => help = true,
            "--generate-config" => generate_config = true,
            "--verbose" | "-v" => verbose = true,
            "--json" => json = true,
            "--typecast" => typecast = true,
            "--replace" => replace = true,
            "--api-key" => api_key = Some(value(arg)?),
            "--csv" => csv = Some(value(arg)?),
            "--view" => list_options = list_options.view(value(arg)?),
            "--formula" => list_options = list_options.formula(value(arg)?),
            "--field" => list_options = list_options.field(value(arg)?),
            "--sort" => list_options = list_options.sort(&value(arg)?),
            "--max-records" => {
                let raw = value(arg)?;
                let max = raw
                    .parse::<u32>()
                    .with_context(|| format!("--max-records expects a number, got {}", raw))?;
                list_options = list_options.max_records(max);
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            _ => positional.push(arg.clone()),
        }
    }

    let command = if help {
        Command::Help
    } else if generate_config {
        Command::GenerateConfig
    } else {
        parse_command(&positional)?
    };

    Ok(CliArgs {
        command,
        api_key,
        verbose,
        json,
        csv,
        list_options,
        typecast,
        replace,
    })
}

fn parse_command(positional: &[String]) -> Result<Command> {
    let (name, rest) = match positional.split_first() {
        Some((name, rest)) => (name.as_str(), rest),
        None => return Ok(Command::Help),
    };
    let arity = |count: usize, usage: &str| -> Result<()> {
        if rest.len() != count {
            bail!("Usage: airtable {}", usage);
        }
        Ok(())
    };

    let command = match name {
        "list" => {
            arity(2, "list <base> <table>")?;
            Command::List {
                base: rest[0].clone(),
                table: rest[1].clone(),
            }
        }
        "get" => {
            arity(3, "get <base> <table> <record>")?;
            Command::Get {
                base: rest[0].clone(),
                table: rest[1].clone(),
                record_id: rest[2].clone(),
            }
        }
        "create" => {
            arity(3, "create <base> <table> <json>")?;
            Command::Create {
                base: rest[0].clone(),
                table: rest[1].clone(),
                fields: parse_fields(&rest[2])?,
            }
        }
        "update" => {
            arity(4, "update <base> <table> <record> <json>")?;
            Command::Update {
                base: rest[0].clone(),
                table: rest[1].clone(),
                record_id: rest[2].clone(),
                fields: parse_fields(&rest[3])?,
            }
        }
        "delete" => {
            if rest.len() < 3 {
                bail!("Usage: airtable delete <base> <table> <record>...");
            }
            Command::Delete {
                base: rest[0].clone(),
                table: rest[1].clone(),
                record_ids: rest[2..].to_vec(),
            }
        }
        "whoami" => {
            arity(0, "whoami")?;
            Command::WhoAmI
        }
        other => bail!("Unknown command: {} (see --help)", other),
    };
    Ok(command)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn generate_config() -> Result<()> {
    let path = Config::get_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Error creating config directory {}", parent.display()))?;
    }
    std::fs::write(&path, Config::create_default_with_comments())
        .with_context(|| format!("Error writing config file {}", path.display()))?;
    println!("Configuration file created at: {:?}", path);
    println!("Edit this file to set your API key and defaults.");
    Ok(())
}

fn write_options(args: &CliArgs) -> WriteOptions {
    WriteOptions {
        typecast: args.typecast,
        replace: args.replace,
        ..WriteOptions::default()
    }
}

fn run_command(api: &Api, args: &CliArgs, config: &Config) -> Result<()> {
    match &args.command {
        Command::List { base, table } => {
            let records = api.table(base.as_str(), table.as_str()).all(&args.list_options)?;
            if let Some(path) = &args.csv {
                export_to_csv(&records, path)?;
            } else if args.json {
                print_json(&records)?;
            } else {
                display_records(&records, &config.display);
            }
        }
        Command::Get { base, table, record_id } => {
            let record = api
                .table(base.as_str(), table.as_str())
                .get(record_id, &ListOptions::new())?;
            if args.json {
                print_json(&record)?;
            } else {
                display_records(std::slice::from_ref(&record), &config.display);
            }
        }
        Command::Create { base, table, fields } => {
            let record = api
                .table(base.as_str(), table.as_str())
                .create(fields.clone(), &write_options(args))?;
            println!("{}", format!("Created {}", record.id).green());
            if args.json {
                print_json(&record)?;
            }
        }
        Command::Update { base, table, record_id, fields } => {
            let record = api
                .table(base.as_str(), table.as_str())
                .update(record_id, fields.clone(), &write_options(args))?;
            println!("{}", format!("Updated {}", record.id).green());
            if args.json {
                print_json(&record)?;
            }
        }
        Command::Delete { base, table, record_ids } => {
            let deleted = api
                .table(base.as_str(), table.as_str())
                .batch_delete(record_ids)?;
            for result in &deleted {
                if result.deleted {
                    println!("{}", format!("Deleted {}", result.id).green());
                } else {
                    println!("{}", format!("Not deleted {}", result.id).yellow());
                }
            }
        }
        Command::WhoAmI => {
            let user = api.whoami()?;
            if args.json {
                print_json(&user)?;
            } else {
                println!("{} {}", "User:".cyan(), user.id);
                if let Some(email) = &user.email {
                    println!("{} {}", "Email:".cyan(), email);
                }
                if let Some(scopes) = &user.scopes {
                    println!("{} {}", "Scopes:".cyan(), scopes.join(", "));
                }
            }
        }
        Command::Help | Command::GenerateConfig => {}
    }
    Ok(())
}

fn run(args: Vec<String>) -> Result<()> {
    let args = parse_args(&args)?;
    airtable_rs::utils::logging::init_tracing(args.verbose);

    match args.command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::GenerateConfig => return generate_config(),
        _ => {}
    }

    let config = Config::load()?;
    let api = config.build_api(args.api_key.as_deref())?;
    tracing::debug!(target: "airtable::cli", "using endpoint {}", api.endpoint_url());
    run_command(&api, &args, &config)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(args) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}
