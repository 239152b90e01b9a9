use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telepush::{push_entry, Config, Entry};

const USAGE: &str = "usage: telepush [config.toml] <title> <url>";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,telepush=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, title, url) = match args.as_slice() {
        [title, url] => (PathBuf::from("config.toml"), title, url),
        [path, title, url] => (PathBuf::from(path), title, url),
        _ => bail!(USAGE),
    };

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if !config.telegram.enabled {
        info!("Telegram integration is disabled, nothing to do");
        return Ok(());
    }

    let settings = config.telegram.settings()?;
    let entry = Entry::new(title.as_str(), url.as_str());

    push_entry(&entry, &settings)
        .await
        .with_context(|| format!("Failed to push entry {}", entry.url))?;

    info!("Entry pushed to Telegram");
    Ok(())
}
