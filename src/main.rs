use anyhow::Result;
use clap::Parser;
use tracing::info;

use rushline::browser::{self, BrowserSession};
use rushline::config::AppConfig;
use rushline::monitor::Monitor;

#[derive(Parser)]
#[command(name = "rushline", about = "Festival ticket-availability watcher with checkout automation")]
struct Cli {
    /// Base config file, without extension
    #[arg(long, default_value = "config/default")]
    config: String,

    /// Local override config file, without extension
    #[arg(long, default_value = "config/local")]
    local: String,

    /// Run a single monitoring cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rushline=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_sources(&cli.config, &cli.local)?;

    info!("Starting Rushline...");

    let session = BrowserSession::launch(config.browser.clone())?;

    if let Some(cookie_path) = &config.watcher.cookies_file {
        match browser::load_cookies(cookie_path) {
            Ok(cookies) => session.inject_cookies(cookies)?,
            Err(e) => tracing::warn!(error = %e, "continuing without session cookies"),
        }
    }

    let mut monitor = Monitor::new(config, session);
    if cli.once {
        monitor.run_once().await?;
        info!("single cycle finished");
    } else {
        monitor.run().await?;
    }

    Ok(())
}
