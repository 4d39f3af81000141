//! Golder CLI

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use golder::config::SuiteConfig;
use golder::golding::GoldEngine;
use golder::network::HttpTransport;
use golder::storage::{EntryState, OsFilesystem};

fn usage() -> ! {
    eprintln!("Golder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: golder <command> <suite.toml>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  gold      Fetch every missing or stale route and persist it");
    eprintln!("  status    Show whether each route's snapshot is fresh, stale or missing");
    eprintln!();
    eprintln!("Set RUST_LOG to control log output (default: info).");
    process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let command = args[1].as_str();
    let suite = Path::new(&args[2]);

    let result = match command {
        "gold" => gold(suite).await,
        "status" => status(suite).await,
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'golder' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn engine(suite: &Path) -> anyhow::Result<GoldEngine> {
    let config = SuiteConfig::from_file(suite)
        .with_context(|| format!("loading suite {}", suite.display()))?;

    let engine = GoldEngine::from_config(
        &config,
        Arc::new(OsFilesystem::new()),
        Arc::new(HttpTransport::new()),
    )
    .await?;
    Ok(engine)
}

async fn gold(suite: &Path) -> anyhow::Result<()> {
    let engine = engine(suite).await?;
    let report = engine.gold_all().await?;

    for outcome in &report.outcomes {
        println!("{:<24} {:>3}  {:?}", outcome.route, outcome.status, outcome.source);
    }
    println!();
    println!(
        "{} cached, {} fetched, {} preserved",
        report.cached(),
        report.fetched(),
        report.preserved()
    );
    Ok(())
}

async fn status(suite: &Path) -> anyhow::Result<()> {
    let engine = engine(suite).await?;

    println!("Snapshot directory: {}", engine.registry().folder_path().display());
    println!();

    for status in engine.status().await? {
        let refresh = status
            .route
            .refresh
            .map_or_else(|| "never".to_string(), |p| p.to_string());
        let state = match status.state {
            EntryState::Missing => "missing".to_string(),
            EntryState::Fresh { age } => format!("fresh ({}s old)", age.as_secs()),
            EntryState::Stale { age } => format!("stale ({}s old)", age.as_secs()),
        };
        println!(
            "{:<24} {:<8} {:<20} {}",
            status.route.name, refresh, state, status.route.url
        );
    }
    Ok(())
}
