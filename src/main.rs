mod admin;
mod bot;
mod callback;
mod config;
mod editor;
mod error;
mod feedback;
mod handlers;
mod i18n;
mod models;
mod session_store;
mod storage;
#[cfg(test)]
mod testing;
mod utils;

use std::sync::Arc;

use anyhow::Result;
use bot::AppState;
use config::Config;
use session_store::{MemorySessionStore, RedisSessionStore, SessionStore};
use storage::SqliteStore;
use teloxide::prelude::*;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting Telegram bot...");
    info!("Database URL: {}", config.database_url);

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);

    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            info!("Edit sessions are stored in Redis");
            Arc::new(RedisSessionStore::connect(url).await?)
        }
        None => {
            info!("REDIS_URL is not set, edit sessions are kept in memory");
            Arc::new(MemorySessionStore::default())
        }
    };

    let bot = Bot::new(&config.telegram_token);
    let state = Arc::new(AppState::new(config, store, sessions));

    bot::start_bot(bot, state).await?;

    Ok(())
}
