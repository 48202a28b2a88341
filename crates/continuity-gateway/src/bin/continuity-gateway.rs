//! Continuity Gateway Binary
//!
//! # Usage
//! ```bash
//! continuity-gateway [--config gateway.json] [--port 8001] [--host 127.0.0.1] [--verbose]
//! ```
//!
//! Environment (also read from `.env`): `GATEWAY_SECRET`, `ADMIN_ORIGINS`,
//! `HOST`, `PORT`, `ARCHIVE_PATH`, `CORPUS_PATH`, `CONTINUITY_LOG`.

use anyhow::Context;
use clap::Parser;
use continuity_gateway::{Gateway, GatewayConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Continuity Gateway - scoring, alignment and archive over HTTP
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config and HOST)
    #[arg(long)]
    host: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("CONTINUITY_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(args.verbose)
        .init();

    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => GatewayConfig::default(),
    }
    .apply_env()?;

    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    print_banner(&config);

    let gateway = Gateway::new(config).context("initializing gateway")?;
    gateway.start().await?;

    Ok(())
}

fn print_banner(config: &GatewayConfig) {
    println!();
    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║                     CONTINUITY GATEWAY                        ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!("HTTP Server");
    println!("   └─ http://{}:{}", config.host, config.port);
    println!();
    println!("Endpoints");
    println!("   ├─ GET  /health              — Health check");
    println!("   ├─ GET  /corpus/stats        — Reference corpus statistics");
    println!("   ├─ GET  /corpus/search       — Reference corpus search");
    println!("   ├─ GET  /identity            — Privileged identity (public view)");
    println!("   ├─ POST /identity/verify     — Verify a claimed identity");
    println!("   ├─ POST /score               — Continuity score");
    println!("   ├─ POST /alignment           — Reference alignment");
    println!("   ├─ POST /archive             — Score, compare and archive");
    println!("   ├─ GET  /archive/anomalies   — Low continuity or broken alignment");
    println!("   ├─ GET  /archive/report      — Aggregate report");
    println!("   ├─ POST /gate/activate       — Suspend");
    println!("   ├─ POST /gate/deactivate     — Resume");
    println!("   └─ GET  /gate/status         — Gate status");
    println!();
    if config.secret.is_none() {
        println!("GATEWAY_SECRET not set: protected routes are locked down");
        println!();
    }
    println!("Press Ctrl+C to stop the gateway");
    println!();
}
