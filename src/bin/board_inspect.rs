use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use trello_notion_sync::config;
use trello_notion_sync::trello::{BoardService, TrelloClient};

#[derive(Parser, Debug)]
#[command(about = "Print the board's lists and custom field definitions")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let client = TrelloClient::new(
        cfg.trello.key.clone(),
        cfg.trello.token.clone(),
        cfg.trello.board_id.clone(),
    );

    let lists = client.list_lists().await?;
    println!("Lists:");
    for list in lists {
        println!("  {} -> {}", list.name, list.id);
    }

    let fields = client.list_custom_fields().await?;
    println!("Custom fields:");
    for field in fields {
        println!(
            "  {} -> {{ id: {}, type: {} }}",
            field.name, field.id, field.field_type
        );
    }
    Ok(())
}
