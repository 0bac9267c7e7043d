use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tasksync_client::{
    config::{DEFAULT_API_URL, DEFAULT_DATABASE_URL, DEFAULT_PAGE_SIZE},
    AirtableClient, ClientError, Connectivity, EventDispatcher, PageLoader, PaginatedFetcher,
    Settings, SqlitePersistence, SyncEvent, TaskStore,
};
use tasksync_core::{DelayOption, Task, TaskDate, TaskDraft, TaskStatus, TaskUpdate};

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Task list synced with an Airtable table", long_about = None)]
struct Cli {
    /// Personal access token
    #[arg(long, env = "AIRTABLE_TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    /// Base id (app...)
    #[arg(long, env = "AIRTABLE_BASE", default_value = "")]
    base: String,

    /// Table name or id
    #[arg(long, env = "AIRTABLE_TABLE", default_value = "")]
    table: String,

    #[arg(long, env = "AIRTABLE_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Endpoint accepting multipart image uploads
    #[arg(long, env = "UPLOAD_ENDPOINT")]
    upload_endpoint: Option<String>,

    /// Local database holding the cached tasks
    #[arg(long, env = "TASKSYNC_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database: String,

    #[arg(long, env = "TASKSYNC_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Treat the network as unavailable
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List bases visible to the token
    Bases,
    /// List tables of a base (defaults to the configured base)
    Tables { base: Option<String> },
    /// Reload every page from the remote table
    Sync,
    /// Show cached tasks
    List {
        /// Include finished tasks
        #[arg(long)]
        all: bool,
    },
    /// Show one task in detail
    Show { id: String },
    /// Create a task
    Add {
        title: String,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Change fields of a task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// To do, In progress or Done
        #[arg(long)]
        status: Option<String>,
    },
    /// Move a task one step forward (To do → In progress → Done)
    Advance { id: String },
    /// Mark a task done
    Done { id: String },
    /// Push the due date back by 1, 2, 7 or 14 days
    Delay { id: String, days: u32 },
    /// Upload an image, optionally attaching it to a task
    Upload {
        path: PathBuf,
        #[arg(long)]
        task: Option<String>,
    },
    /// Forget the locally cached tasks
    Reset,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            base_id: self.base.clone(),
            table_name: self.table.clone(),
            upload_endpoint: self.upload_endpoint.clone(),
            page_size: self.page_size,
            database_url: self.database.clone(),
        }
    }
}

type Store = TaskStore<AirtableClient, SqlitePersistence>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();

    let needs_table = !matches!(
        cli.command,
        Command::Bases | Command::Tables { .. } | Command::Reset
    );
    if needs_table && !settings.is_configured() {
        println!(
            "{}",
            "⚠️  Airtable is not configured: set --token, --base and --table to sync your tasks."
                .yellow()
        );
    }

    let events = Arc::new(EventDispatcher::new());
    events.register_rust_callback(print_event)?;

    let connectivity = Connectivity::new(!cli.offline).with_events(events.clone());
    let remote = Arc::new(AirtableClient::new(settings.clone()));
    let persistence = SqlitePersistence::new(&settings.database_url).await?;
    let store = TaskStore::open(remote.clone(), persistence, connectivity.clone(), events.clone())
        .await?;

    let result = run(&cli, &settings, &store).await;
    events.process_events()?;

    if let Err(e) = result {
        if e.is_transient() {
            eprintln!("{}", "Nothing was changed locally; try again later.".dimmed());
        }
        return Err(e.into());
    }
    Ok(())
}

async fn run(cli: &Cli, settings: &Settings, store: &Store) -> Result<(), ClientError> {
    match &cli.command {
        Command::Bases => {
            for base in store.remote().fetch_bases().await? {
                println!("{}  {}", base.id.green(), base.name);
            }
        }
        Command::Tables { base } => {
            let base_id = base.as_deref().unwrap_or(&settings.base_id);
            for table in store.remote().fetch_tables(base_id).await? {
                println!("{}  {}", table.id.green(), table.name);
            }
        }
        Command::Sync => {
            let fetcher =
                PaginatedFetcher::new(store.remote().clone()).with_page_size(settings.page_size);
            let loader = PageLoader::new(fetcher, store.connectivity().clone());
            let loaded = loader.load_all(store).await;
            println!("🔄 {} tasks loaded", loaded);
        }
        Command::List { all } => {
            let tasks = if *all {
                store.tasks().await
            } else {
                store.pending_tasks().await
            };
            print_task_list(&tasks);
        }
        Command::Show { id } => {
            store.select_task(Some(id.as_str())).await;
            match store.selected_task().await {
                Some(task) => print_task_detail(&task),
                None => println!("❓ No cached task {}", id),
            }
        }
        Command::Add { title, due, notes } => {
            let mut draft = TaskDraft::new(title.clone(), TaskDate::parse_strict(due)?);
            draft.description = notes.clone();
            let task = store.create(draft).await?;
            println!("🆔 {}", task.id.green());
        }
        Command::Edit {
            id,
            title,
            notes,
            due,
            status,
        } => {
            let update = TaskUpdate {
                title: title.clone(),
                description: notes.clone(),
                due_date: due.as_deref().map(TaskDate::parse_strict).transpose()?,
                status: status.as_deref().map(TaskStatus::parse).transpose()?,
                ..Default::default()
            };
            if update.is_empty() {
                println!("Nothing to change");
                return Ok(());
            }
            report_missing(id, store.update(id, update).await?);
        }
        Command::Advance { id } => {
            let Some(task) = store.task(id).await else {
                report_missing(id, None);
                return Ok(());
            };
            match task.status.next() {
                Some(next) => report_missing(id, store.advance_status(id, next).await?),
                None => println!("✅ Already done"),
            }
        }
        Command::Done { id } => {
            report_missing(id, store.advance_status(id, TaskStatus::Done).await?);
        }
        Command::Delay { id, days } => {
            let delay = DelayOption::try_from(*days)?;
            report_missing(id, store.delay(id, delay).await?);
        }
        Command::Upload { path, task } => {
            let bytes = tokio::fs::read(path).await?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let url = store.remote().upload_image(&file_name, bytes).await?;
            println!("🖼️  {}", url.green());

            if let Some(id) = task {
                if let Some(existing) = store.task(id).await {
                    let mut images = existing.images;
                    images.push(url);
                    let update = TaskUpdate {
                        images: Some(images),
                        ..Default::default()
                    };
                    store.update(id, update).await?;
                } else {
                    report_missing(id, None);
                }
            }
        }
        Command::Reset => {
            store.persistence().clear().await?;
            println!("🧹 Local task cache cleared");
        }
    }
    Ok(())
}

fn print_event(event: SyncEvent) {
    match event {
        SyncEvent::OperationSucceeded { message } => println!("✅ {}", message.green()),
        SyncEvent::OperationFailed { message, error } => {
            eprintln!("❌ {} ({})", message.red(), error.dimmed())
        }
        SyncEvent::PageFailed { message } => {
            eprintln!("❌ {} ({})", "Failed to load tasks".red(), message.dimmed())
        }
        SyncEvent::ConnectionLost => println!("{}", "📴 You're currently offline.".blue()),
        _ => {}
    }
}

fn report_missing(id: &str, task: Option<Task>) {
    if task.is_none() {
        println!("❓ No cached task {}", id);
    }
}

fn print_task_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("📭 No tasks found.");
        return;
    }

    println!("{}", "📋 Your Tasks:".bold());
    println!("{}", "─".repeat(72).dimmed());
    for task in tasks {
        let status = match task.status {
            TaskStatus::ToDo => task.status.to_string().normal(),
            TaskStatus::InProgress => task.status.to_string().yellow(),
            TaskStatus::Done => task.status.to_string().green(),
        };
        println!(
            "{:<20} {:<30} {:<14} {}",
            task.id.dimmed(),
            task.title,
            task.due_date.format_short(),
            status
        );
    }
    println!("{}", "─".repeat(72).dimmed());
}

fn print_task_detail(task: &Task) {
    println!("{}", task.title.bold().cyan());
    println!("{}", "─".repeat(40).dimmed());
    if !task.description.is_empty() {
        println!("{}", task.description);
    }
    println!("📅 Due {}", task.due_date.format_long());
    println!("📌 {}", task.status);
    if let Some(completed) = task.completed_date {
        println!("🏁 Completed {}", completed.format_long());
    }
    for image in &task.images {
        println!("🖼️  {}", image);
    }
}
