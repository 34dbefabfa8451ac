use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use trello_notion_sync::config;
use trello_notion_sync::notion::NotionClient;
use trello_notion_sync::sync::SyncEngine;
use trello_notion_sync::trello::TrelloClient;
use trello_notion_sync::watcher::ChangeWatcher;

#[derive(Debug, Parser)]
#[command(author, version, about)]
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
    let engine = SyncEngine::new(trello.clone(), notion);
    let mut watcher = ChangeWatcher::new(trello);

    let poll_interval = Duration::from_secs(cfg.app.poll_interval_seconds);
    let retry_delay = Duration::from_secs(cfg.app.retry_delay_seconds);

    info!("running initial reconciliation pass");
    match engine.perform_sync().await {
        Ok(stats) => info!(?stats, "initial pass complete"),
        Err(err) => {
            error!(?err, "initial pass failed");
            tokio::time::sleep(retry_delay).await;
        }
    }

    info!(
        interval_seconds = cfg.app.poll_interval_seconds,
        "watching board for changes"
    );
    loop {
        tokio::time::sleep(poll_interval).await;
        match watcher.poll().await {
            Ok(Some(summary)) => {
                info!(actions = summary.actions, kinds = ?summary.kinds, "board changed; starting sync");
                match engine.try_sync().await {
                    Ok(Some(stats)) => info!(?stats, "sync pass complete"),
                    Ok(None) => warn!("sync pass already in flight; trigger dropped"),
                    Err(err) => {
                        error!(?err, "sync pass failed");
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
            Ok(None) => debug!("no relevant board activity"),
            Err(err) => {
                warn!(?err, "failed to poll board activity");
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}
