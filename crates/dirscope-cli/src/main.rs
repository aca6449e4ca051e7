use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use dirscope_core::{AppConfig, Database, DirscopeError, ExitCode, ItemStore, NewItem};
use dirscope_dedup::{
    DedupSession, DuplicateAction, DuplicateFinder, group_duplicates_for_review,
    identify_exact_duplicates, remove_exact_duplicates,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "dirscope",
    about = "Directory catalog with duplicate review",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format. Also enabled by setting DIRSCOPE_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List directory items.
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show one item.
    Get { id: String },

    /// Add an item.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long, action = clap::ArgAction::Append)]
        tag: Vec<String>,
        /// Additional field as key=value; the value is parsed as JSON when possible.
        #[arg(long, action = clap::ArgAction::Append)]
        field: Vec<String>,
    },

    /// Delete an item.
    Delete {
        id: String,
        #[arg(long)]
        confirm: bool,
    },

    /// Import a JSON array of items.
    Import { file: String },

    /// Duplicate detection and cleanup.
    Dedup {
        #[command(subcommand)]
        action: DedupCommand,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information.
    Version,
}

#[derive(Subcommand)]
enum DedupCommand {
    /// Show scored duplicate groups.
    Find,
    /// Apply one action to every group, all duplicates selected.
    Process {
        /// merge, variant or keep (defaults to dedup.default_action).
        #[arg(long)]
        action: Option<String>,
    },
    /// List exact duplicates; delete them with --apply --confirm.
    Exact {
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        confirm: bool,
    },
    /// Show title+category groups for manual review.
    Review,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all config values.
    List,
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    init_tracing();

    if let Err(err) = run() {
        let code = err
            .downcast_ref::<DirscopeError>()
            .map(DirscopeError::exit_code)
            .unwrap_or(ExitCode::GeneralError);
        eprintln!("error: {err:#}");
        std::process::exit(code.code());
    }
}

fn run() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    let json_output = cli.json || std::env::var("DIRSCOPE_JSON").as_deref() == Ok("1");

    let mut config = AppConfig::load()?;
    if let Ok(lib_path) = std::env::var("DIRSCOPE_LIBRARY_PATH") {
        config.set_library_path(lib_path.into());
    }
    config.validate()?;

    match cli.command {
        Commands::List { category, limit } => {
            let db = open_db(&config)?;
            let mut items = match category.as_deref() {
                Some(category) => db.list_by_category(category)?,
                None => db.list_all()?,
            };
            items.truncate(limit);

            if json_output {
                print_ok(&serde_json::json!({ "items": items, "total": items.len() }), start)?;
            } else if items.is_empty() {
                println!("No items. Use `dirscope add` or `dirscope import` to add some.");
            } else {
                for item in &items {
                    println!(
                        "{id}  {title:<40}  {category:<15}  {sub}",
                        id = short_id(&item.id),
                        title = item.title,
                        category = item.category,
                        sub = item.subcategory.as_deref().unwrap_or(""),
                    );
                }
            }
        }

        Commands::Get { id } => {
            let db = open_db(&config)?;
            let item = db.get(&id)?;
            if json_output {
                print_ok(&serde_json::to_value(&item)?, start)?;
            } else {
                println!("{}", serde_json::to_string_pretty(&item)?);
            }
        }

        Commands::Add { title, category, description, subcategory, tag, field } => {
            let mut new_item = NewItem::new(title, category);
            new_item.description = description;
            new_item.subcategory = subcategory;
            new_item.tags = tag;
            for pair in &field {
                let (key, value) = parse_field(pair)?;
                new_item.additional_fields.insert(key, value);
            }

            let db = open_db(&config)?;
            let item = db.create(new_item)?;
            if json_output {
                print_ok(&serde_json::to_value(&item)?, start)?;
            } else {
                println!("Added: {} ({})", item.title, item.id);
            }
        }

        Commands::Delete { id, confirm } => {
            if !confirm {
                eprintln!("Add --confirm to delete without prompt.");
                std::process::exit(ExitCode::ConfirmRequired.code());
            }
            let db = open_db(&config)?;
            db.delete(&id)?;
            if json_output {
                print_ok(&serde_json::json!({ "deleted": id }), start)?;
            } else {
                println!("Deleted item: {id}");
            }
        }

        Commands::Import { file } => {
            let contents = std::fs::read_to_string(&file).with_context(|| format!("reading {file}"))?;
            let candidates: Vec<NewItem> =
                serde_json::from_str(&contents).with_context(|| format!("parsing {file}"))?;

            let db = open_db(&config)?;
            let mut created = Vec::new();
            let mut errors = Vec::new();
            for (index, candidate) in candidates.into_iter().enumerate() {
                let title = candidate.title.clone();
                match db.create(candidate) {
                    Ok(item) => created.push(item.id),
                    Err(e) => {
                        tracing::warn!(index, title = %title, error = %e, "import row rejected");
                        errors.push(format!("Row {}: {e}", index + 1));
                    }
                }
            }

            if json_output {
                print_ok(&serde_json::json!({ "created": created, "errors": errors }), start)?;
            } else {
                println!("Imported {} items", created.len());
                for error in &errors {
                    println!("  ✗ {error}");
                }
            }
        }

        Commands::Dedup { action } => {
            let db = open_db(&config)?;
            let finder = DuplicateFinder::new().with_threshold(config.dedup.similarity_threshold);
            let default_action: DuplicateAction = config.dedup.default_action.parse()?;

            match action {
                DedupCommand::Find => {
                    let mut session = DedupSession::new(finder, default_action);
                    let groups = session.find_duplicates(&db)?;

                    if json_output {
                        print_ok(&serde_json::json!({ "groups": groups, "total": groups.len() }), start)?;
                    } else if groups.is_empty() {
                        println!("No duplicates found.");
                    } else {
                        for (index, group) in groups.iter().enumerate() {
                            println!(
                                "[{index}] {} ({})  similarity {:.2}",
                                group.primary_record.title,
                                short_id(&group.primary_record.id),
                                group.similarity,
                            );
                            for duplicate in &group.duplicates {
                                println!("      ↳ {}  {}", short_id(&duplicate.id), duplicate.title);
                            }
                        }
                    }
                }

                DedupCommand::Process { action } => {
                    let action = match action {
                        Some(raw) => raw.parse()?,
                        None => default_action,
                    };
                    let mut session = DedupSession::new(finder, action);
                    session.find_duplicates(&db)?;
                    let results = session.process_all(&db);

                    if json_output {
                        print_ok(&serde_json::to_value(results)?, start)?;
                    } else {
                        println!(
                            "Processed {} groups: {} merged, {} variants, {} kept",
                            results.processed, results.merged, results.variants, results.kept
                        );
                        for error in &results.errors {
                            println!("  ✗ {error}");
                        }
                    }
                    if results.has_errors() {
                        std::process::exit(ExitCode::GeneralError.code());
                    }
                }

                DedupCommand::Exact { apply, confirm } => {
                    if apply {
                        if !confirm {
                            eprintln!("Add --confirm to delete exact duplicates.");
                            std::process::exit(ExitCode::ConfirmRequired.code());
                        }
                        let report = remove_exact_duplicates(&db)?;
                        if json_output {
                            print_ok(&serde_json::to_value(&report)?, start)?;
                        } else {
                            println!(
                                "Removed {} of {} exact duplicates",
                                report.removed.len(),
                                report.identified
                            );
                            for error in &report.errors {
                                println!("  ✗ {error}");
                            }
                        }
                    } else {
                        let ids = identify_exact_duplicates(&db.list_all()?);
                        if json_output {
                            print_ok(&serde_json::json!({ "ids": ids, "total": ids.len() }), start)?;
                        } else if ids.is_empty() {
                            println!("No exact duplicates.");
                        } else {
                            println!("{} exact duplicates (newer copies):", ids.len());
                            for id in &ids {
                                println!("  {id}");
                            }
                        }
                    }
                }

                DedupCommand::Review => {
                    let groups = group_duplicates_for_review(&db.list_all()?);
                    if json_output {
                        print_ok(&serde_json::json!({ "groups": groups, "total": groups.len() }), start)?;
                    } else if groups.is_empty() {
                        println!("Nothing to review.");
                    } else {
                        for group in &groups {
                            println!("{} ({})", group.primary.title, short_id(&group.primary.id));
                            for duplicate in &group.duplicates {
                                println!("      ↳ {}  {}", short_id(&duplicate.id), duplicate.created_at);
                            }
                        }
                    }
                }
            }
        }

        Commands::Config { action: ConfigAction::List } => {
            if json_output {
                print_ok(&serde_json::to_value(&config)?, start)?;
            } else {
                println!("config_path          = {}", AppConfig::config_path().display());
                println!("library_path         = {}", config.library_path().display());
                println!("database_path        = {}", config.database_path().display());
                println!("similarity_threshold = {}", config.dedup.similarity_threshold);
                println!("default_action       = {}", config.dedup.default_action);
            }
        }

        Commands::Version => {
            let version = env!("CARGO_PKG_VERSION");
            if json_output {
                print_ok(&serde_json::json!({ "version": version }), start)?;
            } else {
                println!("dirscope v{version}");
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DIRSCOPE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_ok(data: &Value, start: Instant) -> Result<()> {
    let envelope = serde_json::json!({
        "status": "ok",
        "data": data,
        "meta": { "duration_ms": start.elapsed().as_millis() as u64 }
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn open_db(config: &AppConfig) -> Result<Database> {
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&db_path)?;
    tracing::debug!(path = db.path().unwrap_or(":memory:"), "database opened");
    Ok(db)
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn parse_field(pair: &str) -> Result<(String, Value)> {
    let (key, raw) = pair
        .split_once('=')
        .with_context(|| format!("expected key=value, got {pair:?}"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}
