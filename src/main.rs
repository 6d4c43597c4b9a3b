use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use image_report_relay::config;
use image_report_relay::http::{create_router, AppState};
use image_report_relay::notion::{NotionClient, ReportSchema};
use image_report_relay::report::ReportService;

#[derive(Debug, Parser)]
#[command(author, version, about = "Relay image reports into a Notion database")]
struct Args {
    /// Optional YAML config file; environment variables override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print an example config file and exit
    #[arg(long)]
    print_example_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if args.print_example_config {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(args.config.as_deref()).context("failed to load configuration")?;

    let notion = NotionClient::from_config(&cfg.notion)?;
    let reports = ReportService::new(Arc::new(notion), ReportSchema::from_config(&cfg.notion));
    let app = create_router(AppState::new(reports), &cfg.server.allowed_origins);

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, database = %cfg.notion.database_id, "starting report relay");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
