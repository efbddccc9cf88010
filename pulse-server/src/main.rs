use clap::Parser;
use pulse_core::PulseConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use pulse_server::{http, startup};

#[derive(Parser, Debug)]
#[command(author, version, about = "Culture Pulse feedback and dashboard server", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "pulse.toml")]
    config: String,

    /// Never seed sample feedback, even into an empty store
    #[arg(long)]
    no_seed: bool,

    /// Print store and generator status, then exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match PulseConfig::load_or_default(&args.config) {
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

    let state = match startup::build_state(config, !args.no_seed) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open feedback store: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        let (_, body) = http::health_inner(&state);
        println!(
            "✅ Feedback store: {} records in {}",
            body["records"],
            body["data_dir"].as_str().unwrap_or("?")
        );
        match &state.generator {
            Some(g) => println!("✅ Plan generator: {}", g.backend_name()),
            None => println!("⚠️  Plan generator disabled (no API key)"),
        }
        return Ok(());
    }

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
