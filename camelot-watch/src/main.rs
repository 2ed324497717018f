use clap::Parser;
use camelot_core::{CamelotConfig, DataGateway, HttpGateway};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use camelot_watch::state::Stores;
use camelot_watch::subsystems::refresh;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "camelot.toml")]
    config: String,

    /// Fetch each collection once, report, and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match CamelotConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("{}: {}", args.config, e);
        std::process::exit(1);
    }

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.service.log_level.as_str()));
    fmt().with_env_filter(filter).init();

    let gateway: Arc<dyn DataGateway> = Arc::new(HttpGateway::new(&config.backend)?);

    if args.check {
        return check_backend(gateway.as_ref(), &config).await;
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

    let stores = Arc::new(Stores::new());
    let poll_handle = refresh::start_polling(Arc::clone(&gateway), Arc::clone(&stores), &config.polling);

    let http_task = if config.http.enabled {
        let http_stores = Arc::clone(&stores);
        let http_gateway = Arc::clone(&gateway);
        let http_config = config.clone();
        let http_shutdown = tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = camelot_watch::http::start_http_server(
                http_stores,
                http_gateway,
                http_config,
                http_shutdown,
            )
            .await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        }))
    } else {
        tracing::info!("HTTP view API disabled");
        None
    };

    let mut shutdown = tx.subscribe();
    let _ = shutdown.recv().await;

    poll_handle.shutdown().await;
    if let Some(task) = http_task {
        let _ = task.await;
    }

    tracing::info!("camelot-watch stopped");
    Ok(())
}

async fn check_backend(gateway: &dyn DataGateway, config: &CamelotConfig) -> anyhow::Result<()> {
    println!("Backend: {} ({})", config.backend.base_url, gateway.name());

    let mut failed = false;
    match gateway.cameras().await {
        Ok(c) => println!("✅ cameras: {} records", c.len()),
        Err(e) => {
            println!("❌ cameras: {}", e);
            failed = true;
        }
    }
    match gateway.entities().await {
        Ok(e) => println!("✅ entities: {} records", e.len()),
        Err(e) => {
            println!("❌ entities: {}", e);
            failed = true;
        }
    }
    match gateway.events().await {
        Ok(e) => println!("✅ events: {} records", e.len()),
        Err(e) => {
            println!("❌ events: {}", e);
            failed = true;
        }
    }

    if failed {
        std::process::exit(1);
    }
    println!("✅ Backend check passed");
    Ok(())
}
