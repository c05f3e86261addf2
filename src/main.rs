use std::sync::Arc;

use tracing::{error, info, warn};

use nidrive::{Config, Database, FileStorage, TelegramBot, WebServer};

#[tokio::main]
async fn main() {
    // Load configuration
    let mut config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = nidrive::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        nidrive::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("{} starting", config.server.name);

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> nidrive::Result<()> {
    let config = Arc::new(config);

    let db = Arc::new(Database::open(&config.database.path).await?);
    info!("Database opened at {}", config.database.path);

    let storage = FileStorage::new(&config.storage.path)?;
    info!("Blob storage at {}", config.storage.path);

    if config.telegram.bot_enabled {
        let bot = TelegramBot::new(config.clone(), db.clone(), storage.clone())?;
        tokio::spawn(bot.run());
    } else {
        info!("Telegram bot disabled");
    }

    if !config.web.enabled {
        warn!("Web server disabled; running the bot only");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let server = WebServer::new(config.clone(), db, storage)?;
    server.run().await
}
