//! iplb-mock: standalone fake of the IP load-balancer frontend API.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iplb_mock::{MockState, router};

/// Fake IP load-balancer API
#[derive(Parser, Debug)]
#[command(name = "iplb-mock", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Service to provision (repeatable)
    #[arg(long = "service", default_value = "loadbalancer-test")]
    services: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iplb_mock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let state = MockState::with_services(args.services.iter().cloned()).await;
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;

    info!("Mock API listening on http://{}", args.listen);
    info!("Services: {}", args.services.join(", "));

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
