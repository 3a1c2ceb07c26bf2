use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::path::PathBuf;
use todo_atlas::{Backend, Config, Filter, IdGenerator, Todo, TodoListState, TodoStats, logging, open_backend};
use tracing::error;

#[derive(Parser)]
#[command(name = "todo-atlas")]
#[command(about = "todo-atlas CLI - a to-do list persisted to a local key-value store")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (default: current directory)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Storage backend
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Key the list is stored under
    #[arg(short, long)]
    key: Option<String>,

    /// Config file (default: platform config dir, todo-atlas/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new item to the top of the list
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Show items, optionally filtered
    List {
        /// all, active or completed
        #[arg(short, long, default_value = "all")]
        filter: Filter,
    },

    /// Flip an item between active and completed
    Toggle { id: String },

    /// Delete an item
    Remove { id: String },

    /// Change an item's title
    Rename {
        id: String,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Delete every completed item
    ClearCompleted,

    /// Show completion counts
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();

    let config = match cli.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let mut state = open_state(&cli, &config);

    match cli.command {
        Commands::Add { title } => match state.add_todo(&title.join(" ")) {
            Some(id) => println!("Added {}", id),
            None => println!("Nothing to add: title is blank"),
        },
        Commands::List { filter } => {
            state.set_filter(filter);
            let todos = state.filtered_todos();
            if todos.is_empty() {
                println!("{}", "No items".dimmed());
            }
            for todo in &todos {
                print_todo(todo);
            }
            print_stats(&state.stats());
        }
        Commands::Toggle { id } => {
            if state.get(&id).is_none() {
                println!("No item with id {}", id);
            }
            state.toggle_todo(&id);
            if let Some(todo) = state.get(&id) {
                print_todo(&todo);
            }
        }
        Commands::Remove { id } => {
            match state.get(&id) {
                Some(todo) => println!("Removed \"{}\"", todo.title),
                None => println!("No item with id {}", id),
            }
            state.remove_todo(&id);
        }
        Commands::Rename { id, title } => {
            if state.get(&id).is_none() {
                println!("No item with id {}", id);
            }
            state.rename_todo(&id, &title.join(" "));
            if let Some(todo) = state.get(&id) {
                print_todo(&todo);
            }
        }
        Commands::ClearCompleted => {
            let before = state.total_count();
            state.clear_completed();
            println!("Cleared {} completed item(s)", before - state.total_count());
        }
        Commands::Stats { json } => {
            let stats = state.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
    }

    Ok(())
}

/// Build the list state; a store that fails to open is treated as unavailable
fn open_state(cli: &Cli, config: &Config) -> TodoListState {
    let backend = cli.backend.unwrap_or_else(|| config.backend());
    let store_path = cli.store_path.clone().unwrap_or_else(|| config.store_path());
    let key = cli.key.clone().unwrap_or_else(|| config.storage_key().to_string());

    let store = match open_backend(backend, &store_path) {
        Ok(store) => Some(store),
        Err(e) => {
            error!(path = ?store_path, error = ?e, "Failed to open store, continuing without persistence");
            None
        }
    };

    TodoListState::builder()
        .maybe_store(store)
        .key(key)
        .ids(IdGenerator::new(config.id_strategy()))
        .build()
}

fn print_todo(todo: &Todo) {
    let mark = if todo.completed { "[x]".green() } else { "[ ]".normal() };
    let title = if todo.completed {
        todo.title.strikethrough().dimmed()
    } else {
        todo.title.bold()
    };
    let created = DateTime::from_timestamp_millis(todo.created_at as i64)
        .map(|ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    println!("{} {}  {} {}", mark, title, todo.id.dimmed(), created.dimmed());
}

fn print_stats(stats: &TodoStats) {
    println!(
        "{} total, {} remaining, {} completed ({}%)",
        stats.total,
        stats.remaining.to_string().yellow(),
        stats.completed.to_string().green(),
        stats.percent
    );
}
