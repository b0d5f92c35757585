use std::sync::Arc;

use clap::Parser;
use monggle_core::{MonggleConfig, RecordStore};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use monggle_server::http;
use monggle_server::state::{generator_from_env, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "monggle.toml")]
    config: String,

    /// Start with the three demo nights in the journal
    #[arg(long)]
    demo: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match MonggleConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if args.check {
        let key_present = monggle_core::config::api_key_from_env().is_some();
        println!("listen:      {}:{}", config.http.host, config.http.port);
        println!("model:       {}", config.generation.model);
        println!("temperature: {}", config.generation.temperature);
        println!("api key:     {}", if key_present { "present" } else { "missing" });
        return Ok(());
    }

    let records = if args.demo {
        RecordStore::with_demo_records()
    } else {
        RecordStore::new()
    };
    let generator = generator_from_env(&config);
    let state = Arc::new(AppState::new(config, records, generator));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
