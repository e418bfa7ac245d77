//! rvp - command-line checklist for the residence-permit application.
//!
//! Progress lives in `<data-dir>/rvp702_progress.json`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rvp_progress::{
    ApplicationFormData, Catalog, Commit, FileStorage, ProgressStore, TodoCategory,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rvp")]
#[command(about = "Track your RVP application step by step", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the progress file
    #[arg(long, env = "RVP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON catalog to use instead of the built-in one
    #[arg(long, env = "RVP_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overall completion and the next step to tackle
    Status,

    /// List main steps
    Steps {
        /// Show details, tips and documents
        #[arg(long)]
        details: bool,
    },

    /// List side quests
    Quests,

    /// Mark a step done or not done
    ToggleStep { id: String },

    /// Mark a side quest done or not done
    ToggleQuest { id: String },

    /// Mark a document as held or not held
    ToggleDoc { id: String },

    /// Document checklist of one step, or every known document
    Docs { step: Option<String> },

    /// Manage to-dos
    Todo {
        #[command(subcommand)]
        action: TodoAction,
    },

    /// Application form
    Form {
        #[command(subcommand)]
        action: FormAction,
    },

    /// Show or change the location used for tips
    Location {
        name: Option<String>,

        #[arg(long, conflicts_with = "name")]
        clear: bool,
    },

    /// Erase all progress
    Reset {
        /// Confirm the reset; nothing happens without it
        #[arg(long)]
        yes: bool,
    },

    /// Print a transfer code for moving progress to another device
    Export,

    /// Replace local progress with a transfer code
    Import { code: String },
}

#[derive(Subcommand)]
enum TodoAction {
    Add {
        text: String,

        #[arg(long, default_value = "custom")]
        category: TodoCategory,

        /// Step this to-do belongs to
        #[arg(long)]
        step: Option<String>,
    },
    Toggle { id: String },
    Delete { id: String },
    List,
}

#[derive(Subcommand)]
enum FormAction {
    /// Set one field, e.g. `form set lastName Dupont`
    Set { field: String, value: String },
    Show,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let catalog = match &cli.catalog {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading catalog {}", path.display()))?;
            Catalog::from_json(&json)?
        }
        None => Catalog::builtin()?,
    };

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let store = ProgressStore::builder(FileStorage::new(data_dir))
        .with_catalog(catalog)
        .open();

    run(&store, cli.command)
}

fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set; pass --data-dir")?;
    Ok(PathBuf::from(home).join(".local").join("share").join("rvp"))
}

fn run(store: &ProgressStore<FileStorage>, command: Commands) -> Result<()> {
    match command {
        Commands::Status => {
            let summary = store.summary()?;
            println!(
                "{}% done ({}/{} steps, {}/{} side quests)",
                summary.percentage,
                summary.steps_done,
                summary.steps_total,
                summary.side_quests_done,
                summary.side_quests_total
            );
            println!(
                "To-dos: {} open, {} done. Documents held: {}",
                summary.todos_open, summary.todos_done, summary.documents_held
            );
            match store.next_step()? {
                Some(step) => println!("Next: {} - {}", step.title, step.description),
                None => println!("All steps complete."),
            }
            if let Some(hold) = store.write_hold()? {
                eprintln!("warning: {}", hold);
            }
        }
        Commands::Steps { details } => {
            let progress = store.progress()?;
            for step in store.catalog().steps() {
                println!(
                    "[{}] {} ({})",
                    mark(progress.is_step_complete(&step.id)),
                    step.title,
                    step.id
                );
                if !details {
                    continue;
                }
                for detail in &step.details {
                    println!("      - {}", detail.text());
                    if let Some(tip) = detail.tip() {
                        println!("        tip: {}", tip);
                    }
                }
                for doc in &step.documents_to_give {
                    println!(
                        "      give [{}] {}",
                        mark(progress.has_document(&doc.id)),
                        doc.name
                    );
                }
                for doc in &step.documents_to_receive {
                    println!(
                        "      receive [{}] {}",
                        mark(progress.has_document(&doc.id)),
                        doc.name
                    );
                }
                if let Some(tips) = progress
                    .selected_location
                    .as_deref()
                    .and_then(|location| step.tips_for(location))
                {
                    for tip in tips {
                        println!("      * {}", tip);
                    }
                }
            }
        }
        Commands::Quests => {
            let progress = store.progress()?;
            for quest in store.catalog().side_quests() {
                let optional = if quest.optional { " (optional)" } else { "" };
                println!(
                    "[{}] {}{} ({})",
                    mark(progress.is_side_quest_complete(&quest.id)),
                    quest.title,
                    optional,
                    quest.id
                );
            }
        }
        Commands::ToggleStep { id } => {
            if store.catalog().step(&id).is_none() {
                eprintln!("note: {} is not in the catalog", id);
            }
            let commit = store.toggle_step(&id)?;
            println!("{} {}", id, if commit.value { "done" } else { "not done" });
            report(&commit);
        }
        Commands::ToggleQuest { id } => {
            let commit = store.toggle_side_quest(&id)?;
            println!("{} {}", id, if commit.value { "done" } else { "not done" });
            report(&commit);
        }
        Commands::ToggleDoc { id } => {
            let commit = store.toggle_document(&id)?;
            println!("{} {}", id, if commit.value { "held" } else { "not held" });
            report(&commit);
        }
        Commands::Docs { step } => match step {
            Some(step_id) => {
                let Some(docs) = store.document_checklist(&step_id)? else {
                    bail!("unknown step: {}", step_id);
                };
                for status in &docs.to_give {
                    println!(
                        "give    [{}] {} ({})",
                        mark(status.held),
                        status.document.name,
                        status.document.id
                    );
                }
                for status in &docs.to_receive {
                    println!(
                        "receive [{}] {} ({})",
                        mark(status.held),
                        status.document.name,
                        status.document.id
                    );
                }
            }
            None => {
                let progress = store.progress()?;
                for doc in store.catalog().documents() {
                    println!(
                        "[{}] {} ({})",
                        mark(progress.has_document(&doc.id)),
                        doc.name,
                        doc.id
                    );
                }
            }
        },
        Commands::Todo { action } => run_todo(store, action)?,
        Commands::Form { action } => match action {
            FormAction::Set { field, value } => {
                let mut patch = ApplicationFormData::default();
                patch.set(&field, value)?;
                let commit = store.update_form_data(patch)?;
                report(&commit);
            }
            FormAction::Show => {
                let progress = store.progress()?;
                for field in ApplicationFormData::FIELDS {
                    println!("{:20} {}", field, progress.form_data.get(field).unwrap_or("-"));
                }
            }
        },
        Commands::Location { name, clear } => {
            if name.is_none() && !clear {
                let progress = store.progress()?;
                println!("{}", progress.selected_location.as_deref().unwrap_or("(none)"));
                let locations = store.catalog().locations();
                if !locations.is_empty() {
                    println!("Locations with tips: {}", locations.join(", "));
                }
            } else {
                let commit = store.set_selected_location(name)?;
                report(&commit);
            }
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("reset erases all progress; re-run with --yes to confirm");
            }
            let commit = store.reset_progress()?;
            println!("Progress reset.");
            report(&commit);
        }
        Commands::Export => println!("{}", store.export_transfer_code()?),
        Commands::Import { code } => {
            let commit = store.import_transfer_code(&code)?;
            println!("Progress imported ({}% done).", store.completion_percentage()?);
            report(&commit);
        }
    }
    Ok(())
}

fn run_todo(store: &ProgressStore<FileStorage>, action: TodoAction) -> Result<()> {
    match action {
        TodoAction::Add {
            text,
            category,
            step,
        } => {
            let commit = store.add_todo(&text, category, step.as_deref())?;
            println!("added {}", commit.value);
            report(&commit);
        }
        TodoAction::Toggle { id } => {
            let commit = store.toggle_todo(&id)?;
            match commit.value {
                Some(done) => println!("{} {}", id, if done { "done" } else { "open" }),
                None => println!("no to-do with id {}", id),
            }
            report(&commit);
        }
        TodoAction::Delete { id } => {
            let commit = store.delete_todo(&id)?;
            if !commit.value {
                println!("no to-do with id {}", id);
            }
            report(&commit);
        }
        TodoAction::List => {
            for todo in store.progress()?.todos {
                let step = todo
                    .step_id
                    .map(|id| format!(" -> {}", id))
                    .unwrap_or_default();
                println!(
                    "[{}] {} {} ({}){}",
                    mark(todo.completed),
                    todo.id,
                    todo.text,
                    todo.category,
                    step
                );
            }
        }
    }
    Ok(())
}

fn mark(done: bool) -> char {
    if done {
        'x'
    } else {
        ' '
    }
}

fn report<T>(commit: &Commit<T>) {
    if let Some(warning) = &commit.warning {
        eprintln!("warning: {}", warning);
    }
}
