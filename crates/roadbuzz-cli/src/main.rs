//! Operator CLI for the roadbuzz live view.
//!
//! Thin wrapper over `roadbuzz-client`: tail the live view, pull a
//! one-off snapshot, or cast a vote. Endpoints come from a TOML config
//! file or from flags.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use roadbuzz_client::RoadbuzzClient;
use roadbuzz_core::{ClientConfig, Report, ReportId, VoteType};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roadbuzz", about = "Live community traffic-report view", version)]
struct Cli {
    /// Path to a TOML config file (api_base_url, push_url, tuning).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// REST API base URL; overrides the config file.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Push-channel URL; overrides the config file.
    #[arg(long, global = true)]
    push_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the push channel and print the view as it changes.
    Watch,
    /// Fetch one snapshot and print the current view.
    Refresh,
    /// Cast a vote on a report.
    Vote {
        /// Report id.
        report_id: i64,
        /// Vote direction.
        #[arg(value_parser = parse_direction)]
        direction: VoteType,
        /// Bearer token of the signed-in user.
        #[arg(long, env = "ROADBUZZ_TOKEN")]
        token: String,
    },
}

fn parse_direction(value: &str) -> Result<VoteType, String> {
    match value.to_ascii_lowercase().as_str() {
        "up" | "upvote" => Ok(VoteType::Up),
        "down" | "downvote" => Ok(VoteType::Down),
        other => Err(format!("expected 'up' or 'down', got '{other}'")),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let api = cli
                .api_url
                .clone()
                .context("either --config or --api-url/--push-url is required")?;
            let push = cli
                .push_url
                .clone()
                .context("either --config or --api-url/--push-url is required")?;
            ClientConfig::new(api, push)
        },
    };
    if let Some(api) = &cli.api_url {
        config.api_base_url.clone_from(api);
    }
    if let Some(push) = &cli.push_url {
        config.push_url.clone_from(push);
    }
    Ok(config)
}

fn print_view(reports: &[Report]) {
    if reports.is_empty() {
        println!("(no live reports)");
        return;
    }
    for report in reports {
        println!(
            "#{:<6} {:>12?} {:>8?}  +{}/-{}  {}  {}",
            report.id,
            report.category,
            report.severity,
            report.upvotes,
            report.downvotes,
            report.created_at.format("%H:%M:%S"),
            report.title,
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let client = RoadbuzzClient::new(&config)?;

    match cli.command {
        Command::Watch => {
            let store = client.store();
            let _subscription = client.subscribe(move |report| {
                println!("-- update: #{} {}", report.id, report.title);
                print_view(&store.current_view());
            });
            println!("watching {} (ctrl-c to stop)", config.push_url);
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
        },
        Command::Refresh => {
            let applied = client.refresh().await?;
            println!("{applied} live report(s)");
            print_view(&client.current_view());
        },
        Command::Vote {
            report_id,
            direction,
            token,
        } => {
            client.session().sign_in(token);
            let report = client.vote(ReportId(report_id), direction).await?;
            println!(
                "#{}: +{}/-{}",
                report.id, report.upvotes, report.downvotes
            );
        },
    }
    Ok(())
}
