use std::sync::Arc;

use dotenvy::dotenv;
use envconfig::Envconfig;
use teloxide::{dispatching::Dispatcher, prelude::*};

use medex::backend::{AuthProvider, MemoryAuth, MemoryStore, PgAuth, PgStore, PharmacyStore};
use medex::config::Config;
use medex::db::init_db;
use medex::handlers::{answer, handle_message, AppState, Command};
use medex::Error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize the logger with default settings or "info" level if not specified
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting the pharmacy bot...");

    // Load environment variables from a .env file if present
    dotenv().ok();

    let config = Config::init_from_env()?;

    let (store, auth): (Arc<dyn PharmacyStore>, Arc<dyn AuthProvider>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = init_db(database_url).await?;
                let store = PgStore::connect(pool.clone()).await?;
                (Arc::new(store), Arc::new(PgAuth::new(pool)))
            }
            None => {
                log::warn!("DATABASE_URL is not set; using the in-memory backend");
                (Arc::new(MemoryStore::new()), Arc::new(MemoryAuth::new()))
            }
        };

    let state = AppState::new(store, auth, config.low_stock_threshold);
    let bot = Bot::new(config.telegram_bot_token);

    let handler = Update::filter_message()
        // Handle command messages
        .branch(dptree::entry().filter_command::<Command>().endpoint(answer))
        // Handle keyboard buttons and all other messages
        .branch(dptree::endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        // Enable handling of Ctrl+C for graceful shutdown
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Shutting down gracefully");
    Ok(())
}
