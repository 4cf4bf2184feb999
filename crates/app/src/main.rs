use std::fmt;

use reskill_core::model::{CourseKey, ProgressStatus, UserId};
use services::{AppServices, Clock, ProgressStore, ReconcileError, ReconcileOutcome, SyncConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- show  [--db <sqlite_url>] [--user <id>]");
    eprintln!("  cargo run -p app -- set   <course_key> <status> [--db <sqlite_url>] [--user <id>]");
    eprintln!("  cargo run -p app -- clear [--db <sqlite_url>] [--user <id>]");
    eprintln!("  cargo run -p app -- stats [--db <sqlite_url>] [--user <id>]");
    eprintln!("  cargo run -p app -- sync  --user <id> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- admin [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Statuses: not_started, in_progress, completed");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RESKILL_DB_URL, RESKILL_SLOT_KEY, RUST_LOG");
    eprintln!("  RESKILL_BACKEND_URL, RESKILL_BACKEND_KEY, RESKILL_ACCESS_TOKEN,");
    eprintln!("  RESKILL_REMOTE_TIMEOUT_SECS");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Show,
    Set { key: String, status: String },
    Clear,
    Stats,
    Sync,
    Admin,
}

struct Args {
    command: Command,
    db_url: String,
    user: Option<String>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(first) = args.next() else {
            return Ok(None);
        };
        let mut db_url = std::env::var("RESKILL_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://reskill.sqlite3".into(), normalize_sqlite_url);
        let mut user = None;
        let mut positional = Vec::new();

        if matches!(first.as_str(), "--help" | "-h") {
            return Ok(None);
        }

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => user = Some(require_value(&mut args, "--user")?),
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match first.as_str() {
            "show" => Command::Show,
            "set" => Command::Set {
                key: positional
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "course_key" })?,
                status: positional
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "status" })?,
            },
            "clear" => Command::Clear,
            "stats" => Command::Stats,
            "sync" => {
                if user.is_none() {
                    return Err(ArgsError::MissingValue { flag: "--user" });
                }
                Command::Sync
            }
            "admin" => Command::Admin,
            _ => return Err(ArgsError::UnknownCommand(first)),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Some(Self {
            command,
            db_url,
            user,
        }))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_table(app: &AppServices) {
    let table = app.progress().snapshot();
    let mut records: Vec<_> = table.iter().collect();
    records.sort_by(|a, b| a.course_key().as_str().cmp(b.course_key().as_str()));
    if records.is_empty() {
        println!("no progress recorded");
        return;
    }
    for record in records {
        println!(
            "{:<32} {:<12} started={} completed={}",
            record.course_key(),
            record.status(),
            record
                .started_at()
                .map_or_else(|| "-".to_owned(), |at| at.to_rfc3339()),
            record
                .completed_at()
                .map_or_else(|| "-".to_owned(), |at| at.to_rfc3339()),
        );
    }
}

/// Reconcile as `user` before running `command`.
///
/// Only `sync` fails on an unreachable remote; every other command keeps
/// working against the local replica.
async fn sign_in(
    progress: &ProgressStore,
    user: &UserId,
    command: &Command,
) -> Result<(), ReconcileError> {
    match progress.reconcile(user).await {
        Ok(ReconcileOutcome::Merged { pushed, pulled }) => {
            println!("synced as {user}: pushed {pushed}, pulled {pulled}");
            Ok(())
        }
        Ok(outcome) => {
            tracing::info!(?outcome, "sync skipped");
            Ok(())
        }
        Err(error) if *command == Command::Sync => Err(error),
        Err(error) => {
            tracing::warn!(
                error = %render_error(&error),
                user_id = %user,
                "remote unavailable; continuing locally"
            );
            Ok(())
        }
    }
}

/// The error followed by each of its sources.
fn render_error(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

async fn execute(app: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(raw) = &args.user {
        let user = UserId::new(raw.as_str())?;
        sign_in(&app.progress(), &user, &args.command).await?;
    }

    match &args.command {
        Command::Show | Command::Sync => print_table(app),
        Command::Set { key, status } => {
            let key = CourseKey::new(key.as_str())?;
            let status: ProgressStatus = status.parse()?;
            let record = app.progress().set_progress(key, status);
            println!("{} -> {}", record.course_key(), record.status().label());
        }
        Command::Clear => {
            app.progress().clear_progress();
            println!("progress cleared");
        }
        Command::Stats => {
            let stats = app.progress().get_stats();
            println!("total:       {}", stats.total);
            println!("in progress: {}", stats.in_progress);
            println!("completed:   {}", stats.completed);
            println!("not started: {}", stats.not_started);
            println!("completion:  {}%", stats.completion_rate());
        }
        Command::Admin => {
            let report = app.admin().report().await?;
            for row in &report.rows {
                println!("{:<24} {:<32} {}", row.user_id, row.course_key, row.status);
            }
            println!(
                "{} rows, {} completed, {} in progress",
                report.stats.total, report.stats.completed, report.stats.in_progress
            );
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?
    else {
        print_usage();
        return Ok(());
    };

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let config = SyncConfig::from_env();
    let app = AppServices::new_sqlite(&args.db_url, Clock::system(), &config).await?;

    let result = execute(&app, &args).await;
    app.shutdown().await;
    result
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{}", render_error(err.as_ref()));
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use reskill_core::time::fixed_clock;
    use services::DEFAULT_SLOT_KEY;
    use storage::repository::{InMemorySlot, Storage};
    use storage::rest::{RestConfig, RestProgressStore};

    async fn offline_store() -> ProgressStore {
        let remote = RestProgressStore::new(RestConfig::new("http://127.0.0.1:9", "anon-key"))
            .expect("client");
        let storage = Storage {
            slot: Arc::new(InMemorySlot::new()),
            remote: Arc::new(remote),
        };
        ProgressStore::open(&storage, fixed_clock(), DEFAULT_SLOT_KEY).await
    }

    fn set_command() -> Command {
        Command::Set {
            key: "rust".into(),
            status: "in_progress".into(),
        }
    }

    #[tokio::test]
    async fn local_commands_survive_an_unreachable_remote() {
        let store = offline_store().await;
        let user = UserId::new("u1").unwrap();

        sign_in(&store, &user, &set_command())
            .await
            .expect("set keeps working offline");
        store.set_progress(CourseKey::new("rust").unwrap(), ProgressStatus::InProgress);
        store.settle().await;

        assert_eq!(
            store.status_of(&CourseKey::new("rust").unwrap()),
            ProgressStatus::InProgress
        );
        assert_eq!(store.current_user(), Some(user));
    }

    #[tokio::test]
    async fn sync_reports_an_unreachable_remote() {
        let store = offline_store().await;
        let user = UserId::new("u1").unwrap();

        let err = sign_in(&store, &user, &Command::Sync).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Pull(_)));
    }

    #[test]
    fn rendered_error_includes_every_cause() {
        let err = ReconcileError::Pull(storage::repository::StorageError::Status(503));
        assert_eq!(
            render_error(&err),
            "failed to fetch the remote progress table: remote rejected request with status 503"
        );
    }
}
