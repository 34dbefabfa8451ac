use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use trello_notion_sync::config;
use trello_notion_sync::notion::NotionClient;
use trello_notion_sync::sync::SyncEngine;
use trello_notion_sync::trello::TrelloClient;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run a single reconciliation pass and print its statistics"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let trello = TrelloClient::new(
        cfg.trello.key.clone(),
        cfg.trello.token.clone(),
        cfg.trello.board_id.clone(),
    );
    let notion = NotionClient::new(
        cfg.notion.token.clone(),
        cfg.notion.version.clone(),
        cfg.notion.database_id.clone(),
    );
    let engine = SyncEngine::new(trello, notion);

    info!("starting one-shot reconciliation pass");
    let stats = engine.perform_sync().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
