// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Refresh loop --------
pub static CYCLES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("refresh_cycles_total", "completed refresh cycles").unwrap());

pub static CYCLES_ABORTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("refresh_cycles_aborted_total", "cycles aborted (balance fetch failed)").unwrap()
});

pub static PAIRS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pairs_skipped_total", "pairs skipped for a cycle (labels: pair, reason)"),
        &["pair", "reason"],
    )
    .unwrap()
});

// -------- Orders --------
pub static ORDERS_PLACED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("orders_placed_total", "orders accepted by venue"), &["pair", "side"]).unwrap()
});

pub static ORDERS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("orders_failed_total", "order placements that failed"), &["pair", "side"])
        .unwrap()
});

pub static CANCELS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("order_cancels_total", "cancel attempts (label: result)"), &["result"]).unwrap()
});

pub static ACTIVE_ORDERS: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("active_orders", "orders tracked in the registry").unwrap());

// ---- Config visibility ----
pub static CONFIG_PAIR: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("config_pair", "configured pairs (label: pair)"), &["pair"]).unwrap()
});

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(CYCLES.clone())),
        REGISTRY.register(Box::new(CYCLES_ABORTED.clone())),
        REGISTRY.register(Box::new(PAIRS_SKIPPED.clone())),
        REGISTRY.register(Box::new(ORDERS_PLACED.clone())),
        REGISTRY.register(Box::new(ORDERS_FAILED.clone())),
        REGISTRY.register(Box::new(CANCELS.clone())),
        REGISTRY.register(Box::new(ACTIVE_ORDERS.clone())),
        REGISTRY.register(Box::new(CONFIG_PAIR.clone())),
    ] {
        if let Err(e) = m {
            tracing::warn!(%e, "metric registration failed");
        }
    }
}

/// Current registry contents in Prometheus text exposition format.
pub fn encode_metrics() -> Vec<u8> {
    let mut out = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut out) {
        tracing::warn!(%e, "metrics encode failed");
    }
    out
}

fn request_path(raw: &[u8]) -> Option<&str> {
    // "GET /metrics HTTP/1.1"
    let line = std::str::from_utf8(raw).ok()?.lines().next()?;
    let mut parts = line.split_whitespace();
    match (parts.next()?, parts.next()?) {
        ("GET", path) => Some(path),
        _ => None,
    }
}

fn respond(stream: &mut TcpStream, status: &str, body: &[u8]) -> std::io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )?;
    stream.write_all(body)?;
    stream.flush()
}

fn handle_client(mut stream: TcpStream) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf)?;
    match request_path(&buf[..n]) {
        Some("/") | Some("/metrics") => respond(&mut stream, "200 OK", &encode_metrics()),
        _ => respond(&mut stream, "404 Not Found", b"not found\n"),
    }
}

/// Exporter di OS thread terpisah; tidak menyentuh state trading.
pub fn serve_metrics(port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)?;
    tracing::info!(%addr, "metrics listening (GET / or /metrics)");
    thread::spawn(move || {
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => {
                    if let Err(e) = handle_client(stream) {
                        tracing::debug!(%e, "metrics client error");
                    }
                }
                Err(e) => tracing::warn!(%e, "metrics accept error"),
            }
        }
    });
    Ok(())
}
