use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;

use shangbang::cli::{Cli, Commands};
use shangbang::core::{config, init_logger};
use shangbang::storage::{binding_codes, create_pool, drafts, get_connection, slots};
use shangbang::storage::activity_log;
use shangbang::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    // Catch panics from the dispatcher instead of terminating
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Load environment variables from .env if present, before config
    // statics are first read
    let _ = dotenv();

    init_logger()?;

    let cli = Cli::parse_args();
    match cli.command {
        Some(Commands::GenCode { count, expiry_hours }) => run_gen_code(count, expiry_hours),
        Some(Commands::Cleanup) => run_cleanup(),
        Some(Commands::SeedSlots { times }) => run_seed_slots(&times),
        Some(Commands::Run) | None => run_bot().await,
    }
}

async fn run_bot() -> Result<()> {
    if config::BOT_TOKEN.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN environment variable not set"));
    }
    // teloxide reads TELOXIDE_TOKEN; mirror BOT_TOKEN for convenience
    if std::env::var("TELOXIDE_TOKEN").is_err() {
        std::env::set_var("TELOXIDE_TOKEN", config::BOT_TOKEN.as_str());
    }

    let db_pool = Arc::new(create_pool(&config::DATABASE_PATH)?);
    log::info!("Database ready at {}", *config::DATABASE_PATH);

    if config::ADMIN_IDS.is_empty() {
        log::warn!("ADMIN_IDS is empty: admin commands and panels are unreachable");
    }

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let deps = HandlerDeps::new(Arc::clone(&db_pool));

    log::info!("Starting dispatcher");
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn run_gen_code(count: u32, expiry_hours: i64) -> Result<()> {
    let db_pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&db_pool)?;

    for _ in 0..count {
        let code = binding_codes::generate(&conn, expiry_hours)?;
        println!("{}  (expires: {})", code.code, code.expires_at.as_deref().unwrap_or("never"));
    }
    Ok(())
}

/// The manually invoked sweep: expired codes, stale drafts, old logs.
fn run_cleanup() -> Result<()> {
    let db_pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&db_pool)?;

    let codes = binding_codes::purge_expired(&conn)?;
    let stale = drafts::sweep_stale(&conn, config::onboarding::DRAFT_TTL_HOURS)?;
    let logs = activity_log::prune_older_than(&conn, config::retention::ACTIVITY_LOG_DAYS)?;

    println!("Removed {} expired code(s), {} stale draft(s), {} old log row(s)", codes, stale, logs);
    Ok(())
}

fn run_seed_slots(times: &str) -> Result<()> {
    let db_pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&db_pool)?;

    let existing: Vec<String> = slots::all(&conn)?.into_iter().map(|s| s.time_str).collect();
    let mut added = 0;
    for (order, time) in times.split(',').map(str::trim).filter(|t| !t.is_empty()).enumerate() {
        if existing.iter().any(|t| t == time) {
            continue;
        }
        slots::add(&conn, time, order as i64)?;
        added += 1;
    }
    println!("Seeded {} slot(s)", added);
    Ok(())
}
