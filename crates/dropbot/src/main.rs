use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use secrecy::SecretString;
use teloxide::prelude::*;

use dropbot::cli::{Cli, Commands};
use dropbot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TeloxideTransport};
use dropcore::core::config::{self, Settings};
use dropcore::core::logging::log_tool_configuration;
use dropcore::core::{format_duration, format_size, init_logger, is_valid_url};
use dropcore::download::{DownloadOrchestrator, YtDlpBackend};
use dropcore::job::JobRegistry;
use dropcore::media::MediaTools;
use dropcore::pipeline::{Pipeline, PipelineConfig};
use dropcore::storage::{create_pool, SqliteStore};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (settings, logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Environment variables from .env must be in place before any config static is read
    let _ = dotenv();

    // Log panics instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    let settings = Settings::load(cli.config.as_deref())?;
    init_logger(settings.log_file.as_deref())?;

    match cli.command {
        Some(Commands::Run) | None => run_bot(settings).await,
        Some(Commands::Formats { url }) => run_cli_formats(&settings, &url).await,
        Some(Commands::Migrate) => run_migrate(&settings),
    }
}

fn downloader(settings: &Settings) -> DownloadOrchestrator {
    let backend = Arc::new(YtDlpBackend::new(settings.ytdlp_bin.clone(), settings.download_timeout()));
    DownloadOrchestrator::new(backend, settings.download_dir.clone())
}

/// Long-polling bot until Ctrl-C
async fn run_bot(settings: Settings) -> Result<()> {
    log::info!("Starting dropbot...");
    log_tool_configuration(&settings);

    if config::BOT_TOKEN.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN environment variable not set"));
    }
    let token = SecretString::from(config::BOT_TOKEN.clone());

    tokio::fs::create_dir_all(&settings.download_dir).await?;
    let store = SqliteStore::new(
        create_pool(&settings.database_path).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    let bot = create_bot(&token)?;
    let transport = Arc::new(TeloxideTransport::new(bot.clone()));
    let pipeline = Pipeline::new(
        downloader(&settings),
        MediaTools::system(&settings),
        transport.clone(),
        Arc::new(store.clone()),
        PipelineConfig::from(&settings),
    );
    let deps = HandlerDeps::new(
        store,
        JobRegistry::new(),
        Arc::new(pipeline),
        transport,
        Arc::new(settings),
    );

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    log::info!("Bot is ready, waiting for updates");
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

/// Prints title and format list of a URL
async fn run_cli_formats(settings: &Settings, url: &str) -> Result<()> {
    if !is_valid_url(url) {
        return Err(anyhow::anyhow!("Not a valid URL: {}", url));
    }
    let media = downloader(settings).describe(url).await?;

    println!("{}", media.title);
    println!("Uploader: {}", media.uploader.as_deref().unwrap_or("Unknown"));
    println!("Duration: {}", format_duration(media.duration));
    println!();
    for format in &media.formats {
        println!(
            "{:<28} {:<14} {:<6} {}",
            format.format_id,
            format.resolution,
            format.ext,
            format.filesize.map(format_size).unwrap_or_default()
        );
    }
    Ok(())
}

fn run_migrate(settings: &Settings) -> Result<()> {
    create_pool(&settings.database_path)?;
    log::info!("Database schema at {} is up to date", settings.database_path.display());
    Ok(())
}
