// ===============================
// src/main.rs
// ===============================
/*
 # jalankan bot (default subcommand = run)
 RUST_LOG=info cargo run --release

 # cek tanpa submit order
 cargo run -- balances
 cargo run -- market --pair XBTZAR --depth 10
 cargo run -- sizes
 cargo run -- orders --pair ETHZAR

 # metrics (kalau METRICS_PORT di-set)
 curl -s localhost:9898/metrics | grep '^orders_placed_total'
*/
/*
=============================================================================
Project : luno_mm_bot — polling market maker for the Luno REST API
Module  : main.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Cancels stale quotes, reads tickers, quotes a symmetric spread
          around mid, sizes from available balance and resubmits post-only
          limit orders on a fixed refresh interval.
=============================================================================
*/
mod config;
mod diagnostics;
mod domain;
mod error;
mod gateway;
mod gateway_luno; // Luno REST (basic auth)
mod luno;         // wire types
mod metrics;
mod quote;
mod refresh;
mod registry;
mod shutdown;
mod sizer;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::BotError;
use crate::gateway_luno::LunoGateway;
use crate::refresh::MarketMaker;
use crate::shutdown::Shutdown;

#[derive(Parser, Debug)]
#[command(name = "luno_mm_bot", version, about = "Polling market maker for Luno")]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the refresh loop until Ctrl+C (default)
    Run,
    /// Non-zero account balances
    Balances,
    /// Ticker, computed quotes and top of the order book
    Market {
        #[arg(long)]
        pair: Option<String>,
        #[arg(long, default_value_t = 5)]
        depth: usize,
    },
    /// Order sizes at mid price
    Sizes {
        #[arg(long)]
        pair: Option<String>,
    },
    /// Open orders on the account
    Orders {
        #[arg(long)]
        pair: Option<String>,
    },
    /// Every read-only check in sequence
    All,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli.cmd.unwrap_or(Cmd::Run)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cmd: Cmd) -> Result<(), BotError> {
    // ---- Load config ----
    let cfg = Config::from_env()?;
    info!(
        api = %cfg.api_url,
        pairs = ?cfg.pairs,
        spread_pct = %cfg.spread_percentage,
        size_pct = %cfg.order_size_percentage,
        refresh_secs = cfg.refresh_interval.as_secs(),
        post_only = cfg.post_only,
        credentials = ?cfg.credentials,
        "startup config"
    );

    let gw = LunoGateway::new(&cfg)?;

    match cmd {
        Cmd::Run => trade(&gw, &cfg).await,
        Cmd::Balances => {
            println!("{}", diagnostics::check_balances(&gw).await?);
            Ok(())
        }
        Cmd::Market { pair, depth } => {
            let pairs = diagnostics::select_pairs(&gw, &cfg, pair.as_deref()).await?;
            println!("{}", diagnostics::check_market(&gw, &cfg, &pairs, depth).await);
            Ok(())
        }
        Cmd::Sizes { pair } => {
            let pairs = diagnostics::select_pairs(&gw, &cfg, pair.as_deref()).await?;
            println!("{}", diagnostics::check_sizes(&gw, &cfg, &pairs).await?);
            Ok(())
        }
        Cmd::Orders { pair } => {
            println!("{}", diagnostics::check_orders(&gw, pair.as_deref()).await?);
            Ok(())
        }
        Cmd::All => {
            let pairs = diagnostics::select_pairs(&gw, &cfg, None).await?;
            println!("{}", diagnostics::check_balances(&gw).await?);
            println!("{}", diagnostics::check_market(&gw, &cfg, &pairs, 5).await);
            println!("{}", diagnostics::check_sizes(&gw, &cfg, &pairs).await?);
            println!("{}", diagnostics::check_orders(&gw, None).await?);
            Ok(())
        }
    }
}

async fn trade(gw: &LunoGateway, cfg: &Config) -> Result<(), BotError> {
    // ---- Metrics ----
    metrics::init();
    for p in &cfg.pairs {
        metrics::CONFIG_PAIR.with_label_values(&[p]).set(1);
    }
    if let Some(port) = cfg.metrics_port {
        metrics::serve_metrics(port)?;
    }

    let shutdown = Shutdown::new();
    shutdown.spawn_signal_handler();

    info!("starting market maker");
    let mut mm = MarketMaker::bootstrap(gw, cfg, shutdown).await?;
    let sweep = mm.run().await?;
    info!(cancelled = sweep.cancelled, failed = sweep.failed.len(), "bye");
    Ok(())
}
