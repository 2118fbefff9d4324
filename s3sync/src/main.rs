use std::sync::Arc;

use anyhow::Context;
use s3sync::actions::{DeleteTarget, FileActions};
use s3sync::config::AppConfig;
use s3sync::format::format_size;
use s3sync::listing::{Entry, ListingView, NormalizedPath, RemoteListingService};
use s3sync::sync::{SyncMachine, SyncState};
use s3sync_core::BackendClient;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    List(String),
    Sync,
    Url(String),
    Remove { path: String, local: bool },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(command) = args.next() else {
        return Ok(CliMode::Help);
    };
    let rest: Vec<String> = args.collect();
    let mode = match command.as_str() {
        "--help" | "-h" | "help" => CliMode::Help,
        "ls" => match rest.as_slice() {
            [] => CliMode::List(String::new()),
            [path] => CliMode::List(path.clone()),
            _ => anyhow::bail!("ls takes at most one path"),
        },
        "sync" => {
            if let Some(extra) = rest.first() {
                anyhow::bail!("unknown argument: {extra}");
            }
            CliMode::Sync
        }
        "url" => match rest.as_slice() {
            [path] => CliMode::Url(path.clone()),
            _ => anyhow::bail!("url takes exactly one path"),
        },
        "rm" => {
            let mut path = None;
            let mut local = false;
            for arg in rest {
                match arg.as_str() {
                    "--local" => local = true,
                    other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
                    _ if path.is_some() => anyhow::bail!("rm takes exactly one path"),
                    _ => path = Some(arg),
                }
            }
            let path = path.context("rm needs a path")?;
            CliMode::Remove { path, local }
        }
        other => anyhow::bail!("unknown command: {other}"),
    };
    Ok(mode)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn file_entry(path: &str) -> anyhow::Result<Entry> {
    let path = NormalizedPath::new(path);
    anyhow::ensure!(!path.is_root(), "a file path is required");
    let key = path.as_str().to_string();
    let name = key.rsplit('/').next().unwrap_or(&key).to_string();
    Ok(Entry::file(name, key, None, None))
}

fn print_entry(entry: &Entry) {
    if entry.is_folder() {
        let files = entry.file_count.unwrap_or(0);
        let size = format_size(entry.total_size.unwrap_or(0));
        println!("{}/\t{files} files\t{size}", entry.name);
    } else {
        let size = entry.size.map(format_size).unwrap_or_default();
        let video = if entry.is_video { "\tvideo" } else { "" };
        println!("{}\t{size}{video}", entry.name);
    }
}

fn print_state(state: &SyncState) {
    match state {
        SyncState::Running {
            message,
            progress,
            detail,
        } => {
            let label = detail
                .as_ref()
                .and_then(|detail| detail.label.as_deref())
                .unwrap_or("");
            println!("[{progress:>3}%] {message} {label}");
        }
        other => println!("{}: {}", other.label(), other.message()),
    }
}

async fn run_sync(machine: &SyncMachine) -> anyhow::Result<()> {
    let mut rx = machine.subscribe();
    machine.start().await?;
    let mut seen_active = false;
    loop {
        let state = rx.borrow_and_update().clone();
        print_state(&state);
        seen_active |= state.is_active();
        match state {
            SyncState::Failed { message } => anyhow::bail!(message),
            SyncState::Completed { .. } => return Ok(()),
            SyncState::Idle { .. } if seen_active => return Ok(()),
            _ => {}
        }
        rx.changed().await.context("sync machine went away")?;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: s3sync <command>");
        println!("  ls [PATH]          List a folder of the bucket");
        println!("  sync               Upload the sync folder and follow progress");
        println!("  url PATH           Print a streaming URL for a file");
        println!("  rm PATH [--local]  Delete a file from the bucket, or its local copy");
        return Ok(());
    }
    init_tracing();

    let config = AppConfig::from_env()?;
    let client = BackendClient::with_base_url(&config.api_url)
        .with_context(|| format!("invalid API url {}", config.api_url))?;
    let view = Arc::new(ListingView::new(
        RemoteListingService::new(client.clone()),
        config.bucket.clone(),
        config.cache_ttl,
    ));

    match mode {
        CliMode::List(path) => {
            let snapshot = view.navigate(&path).await;
            if let Some(error) = snapshot.error {
                anyhow::bail!("cannot list {}: {error}", snapshot.path);
            }
            for entry in &snapshot.entries {
                print_entry(entry);
            }
        }
        CliMode::Sync => {
            let machine = SyncMachine::new(client, config.sync_target(), config.timings, view);
            run_sync(&machine).await?;
        }
        CliMode::Url(path) => {
            let actions = FileActions::new(client, view);
            println!("{}", actions.stream_url(&file_entry(&path)?).await?);
        }
        CliMode::Remove { path, local } => {
            let actions = FileActions::new(client, view);
            let target = if local {
                DeleteTarget::Local
            } else {
                DeleteTarget::Remote
            };
            actions.delete(&file_entry(&path)?, target).await?;
            println!("deleted {path}");
        }
        CliMode::Help => {}
    }
    Ok(())
}
