//! The Game Maker service.
//!
//! Serves the JSON API that turns a chat about a children's book into a
//! playable browser game.
//!
//! # Headless Mode
//!
//! Run with `--headless` for a text-based interface suitable for automated testing:
//!
//! ```bash
//! cargo run -p game-maker -- --headless
//! ```

mod config;
mod headless;
mod routes;

use anyhow::Context;
use config::ServerConfig;
use game_maker_core::SessionHost;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "game_maker=info,game_maker_core=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let headless = args.iter().any(|a| a == "--headless");

    init_tracing(headless);

    let config = ServerConfig::from_env()?;
    let agents = Arc::new(config.agents()?);

    if headless {
        return headless::run_headless(agents).await;
    }

    let app = routes::build_router(SessionHost::new(agents));
    info!(bind_addr = %config.bind_addr, model = ?config.model, "game-maker listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Logs go to stderr in headless mode so stdout carries only the protocol.
fn init_tracing(headless: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if headless {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

fn print_help() {
    println!("The Game Maker - turn a book into a browser game");
    println!();
    println!("USAGE:");
    println!("    game-maker [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --headless    Chat on stdin/stdout instead of serving HTTP");
    println!("    -h, --help    Show this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    ANTHROPIC_API_KEY         Required");
    println!("    GAME_MAKER_BIND           Listen address (default 0.0.0.0:5001)");
    println!("    GAME_MAKER_MODEL          Model override");
    println!("    GAME_MAKER_TIMEOUT_SECS   Per-call timeout (default 120)");
    println!("    RUST_LOG                  Log filter");
}
