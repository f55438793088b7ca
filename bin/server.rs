// Write-off Reconciliation - Web Server
// Summary, augmented rows and CSV download over HTTP

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use writeoff_recon::server::{router, AppState};
use writeoff_recon::{check_sources_exist, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("🌐 Write-off Reconciliation - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = config_arg();
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    // Not fatal here: the files may be dropped in after startup, and every
    // request reports missing files on its own.
    if let Err(e) = check_sources_exist(&[config.repayments.path.as_path(), config.writeoffs.path.as_path()]) {
        log::warn!("{}", e);
    }

    let addr = config.server.bind.clone();
    let state = AppState::new(config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API:      /api/summary, /api/writeoffs");
    println!("   Download: /download");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

fn config_arg() -> Option<PathBuf> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
