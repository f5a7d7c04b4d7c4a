// ===============================
// src/refresh.rs (refresh loop)
// ===============================
//
// Per cycle:
//   FetchingBalances -> per pair (Cancelling -> Quoting -> Sizing -> Submitting)
//   -> Sleeping -> ulang.
// Interrupt dicek di antara step (bukan di tengah request). Interrupt atau error
// fatal -> Shutdown: cancel semua order yang di-track lalu sapu semua open order
// di venue.
//
// Catatan: pola cancel-lalu-pasang-ulang meninggalkan jeda singkat tanpa quote
// setiap cycle.
//
use ahash::AHashMap as HashMap;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domain::{BalanceBook, OrderRequest, PairMeta, Side, TrackedOrder};
use crate::error::BotError;
use crate::gateway::{Gateway, GatewayError};
use crate::metrics::{CANCELS, CYCLES, CYCLES_ABORTED, ORDERS_FAILED, ORDERS_PLACED, PAIRS_SKIPPED};
use crate::quote::compute_quotes;
use crate::registry::OrderRegistry;
use crate::shutdown::Shutdown;
use crate::sizer::{finalize_volume, order_volume, SizingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FetchingBalances,
    Cancelling,
    Quoting,
    Sizing,
    Submitting,
    Sleeping,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchBalances,
    ListOrders,
    CancelOrder,
    FetchTicker,
    Quote,
    PlaceOrder,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::FetchBalances => "fetch_balances",
            Operation::ListOrders => "list_orders",
            Operation::CancelOrder => "cancel_order",
            Operation::FetchTicker => "fetch_ticker",
            Operation::Quote => "quote",
            Operation::PlaceOrder => "place_order",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleFailure {
    pub op: Operation,
    pub pair: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub orders_placed: usize,
    pub orders_cancelled: usize,
    pub pairs_skipped: Vec<String>,
    pub failures: Vec<CycleFailure>,
}

impl CycleReport {
    fn fail(&mut self, op: Operation, pair: &str, reason: impl ToString) {
        self.failures.push(CycleFailure { op, pair: pair.to_string(), reason: reason.to_string() });
    }

    fn skip(&mut self, pair: &str, reason: &str) {
        PAIRS_SKIPPED.with_label_values(&[pair, reason]).inc();
        self.pairs_skipped.push(pair.to_string());
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Balance fetch failed; nothing can be sized this cycle
    Aborted(GatewayError),
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum Halt {
    Interrupted,
    Fatal(GatewayError),
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub cancelled: usize,
    pub failed: Vec<String>,
    pub listing_failed: bool,
}

/// Match configured pairs against the venue listing. Returns resolved metadata
/// in configured order plus the pairs the venue does not know.
pub fn resolve_pairs(pairs: &[String], markets: Vec<PairMeta>) -> (Vec<PairMeta>, Vec<String>) {
    let mut by_id: HashMap<String, PairMeta> = markets.into_iter().map(|m| (m.pair.clone(), m)).collect();
    let mut resolved = Vec::with_capacity(pairs.len());
    let mut missing = Vec::new();
    for p in pairs {
        match by_id.remove(p) {
            Some(m) => resolved.push(m),
            None => missing.push(p.clone()),
        }
    }
    (resolved, missing)
}

fn new_client_order_id() -> String {
    format!("mm-{}-{}", Utc::now().timestamp_millis(), rand::thread_rng().gen::<u32>())
}

/// Sort out fatal gateway errors; everything else is handled at the call site.
fn recoverable(e: GatewayError) -> Result<GatewayError, Halt> {
    if e.is_fatal() { Err(Halt::Fatal(e)) } else { Ok(e) }
}

pub struct MarketMaker<'a, G: Gateway> {
    gw: &'a G,
    cfg: &'a Config,
    pairs: Vec<PairMeta>,
    registry: OrderRegistry,
    shutdown: Shutdown,
    phase: Phase,
}

impl<'a, G: Gateway> MarketMaker<'a, G> {
    pub fn new(gw: &'a G, cfg: &'a Config, pairs: Vec<PairMeta>, shutdown: Shutdown) -> Self {
        Self { gw, cfg, pairs, registry: OrderRegistry::new(), shutdown, phase: Phase::Idle }
    }

    /// Startup status check: market listing + balances must both answer
    /// before any order is placed.
    pub async fn bootstrap(gw: &'a G, cfg: &'a Config, shutdown: Shutdown) -> Result<Self, BotError> {
        let markets = gw.markets().await?;
        let (pairs, missing) = resolve_pairs(&cfg.pairs, markets);
        if !missing.is_empty() {
            warn!(?missing, "pairs not listed by venue, ignoring");
        }
        if pairs.is_empty() {
            return Err(BotError::NoPairs(missing));
        }
        let balances = BalanceBook::new(gw.balances().await?);
        info!(
            pairs = ?pairs.iter().map(|m| m.pair.as_str()).collect::<Vec<_>>(),
            assets = balances.len(),
            "status check ok"
        );
        Ok(Self::new(gw, cfg, pairs, shutdown))
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase { self.phase }

    #[cfg(test)]
    pub fn registry(&self) -> &OrderRegistry { &self.registry }

    fn set_phase(&mut self, next: Phase) {
        if self.phase != next {
            debug!(from = ?self.phase, to = ?next, "phase");
            self.phase = next;
        }
    }

    fn checkpoint(&self) -> Result<(), Halt> {
        if self.shutdown.is_triggered() { Err(Halt::Interrupted) } else { Ok(()) }
    }

    /// Loop until interrupted or a fatal error, then sweep.
    pub async fn run(&mut self) -> Result<SweepReport, BotError> {
        let halt = self.run_until_halt().await;
        let sweep = self.shutdown_sweep().await;
        match halt {
            Halt::Interrupted => {
                info!("bot stopped by user");
                Ok(sweep)
            }
            Halt::Fatal(e) => {
                error!(%e, "unrecoverable gateway error");
                Err(BotError::Gateway(e))
            }
        }
    }

    async fn run_until_halt(&mut self) -> Halt {
        loop {
            if self.shutdown.is_triggered() {
                return Halt::Interrupted;
            }
            info!("placing market making orders");
            match self.run_cycle().await {
                Ok(CycleOutcome::Completed(r)) => info!(
                    placed = r.orders_placed,
                    cancelled = r.orders_cancelled,
                    skipped = r.pairs_skipped.len(),
                    failures = r.failures.len(),
                    "cycle done"
                ),
                Ok(CycleOutcome::Aborted(e)) => {
                    error!(op = %Operation::FetchBalances, %e, "failed to get account balances, skipping cycle");
                }
                Err(h) => return h,
            }

            self.set_phase(Phase::Sleeping);
            info!(secs = self.cfg.refresh_interval.as_secs(), "waiting before refreshing orders");
            if self.shutdown.sleep(self.cfg.refresh_interval).await {
                return Halt::Interrupted;
            }
        }
    }

    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, Halt> {
        self.set_phase(Phase::FetchingBalances);
        let balances = match self.gw.balances().await {
            Ok(b) => BalanceBook::new(b),
            Err(e) => {
                let e = recoverable(e)?;
                CYCLES_ABORTED.inc();
                return Ok(CycleOutcome::Aborted(e));
            }
        };

        let mut report = CycleReport::default();
        for i in 0..self.pairs.len() {
            self.checkpoint()?;
            let meta = self.pairs[i].clone();
            self.refresh_pair(&meta, &balances, &mut report).await?;
        }
        CYCLES.inc();
        Ok(CycleOutcome::Completed(report))
    }

    async fn refresh_pair(
        &mut self,
        meta: &PairMeta,
        balances: &BalanceBook,
        report: &mut CycleReport,
    ) -> Result<(), Halt> {
        let pair = meta.pair.as_str();
        info!(%pair, "processing pair");

        self.set_phase(Phase::Cancelling);
        self.cancel_pair_orders(pair, report).await?;
        if !meta.is_tradable() {
            info!(%pair, status = %meta.trading_status, "market not tradable, skipping");
            report.skip(pair, "not_tradable");
            return Ok(());
        }
        self.checkpoint()?;

        self.set_phase(Phase::Quoting);
        let ticker = match self.gw.ticker(pair).await {
            Ok(t) => t,
            Err(e) => {
                let e = recoverable(e)?;
                error!(op = %Operation::FetchTicker, %pair, %e, "failed to get ticker, skipping pair");
                report.fail(Operation::FetchTicker, pair, &e);
                report.skip(pair, "ticker");
                return Ok(());
            }
        };
        let price_dp = meta.price_scale.unwrap_or(self.cfg.price_precision);
        let quotes = match compute_quotes(&ticker, self.cfg.spread_percentage, price_dp) {
            Ok(q) => q,
            Err(e) => {
                warn!(op = %Operation::Quote, %pair, %e, "skipping pair");
                report.fail(Operation::Quote, pair, &e);
                report.skip(pair, "invalid_market_data");
                return Ok(());
            }
        };
        debug!(%pair, bid = %quotes.bid_price, ask = %quotes.ask_price, "quotes");
        self.checkpoint()?;

        self.set_phase(Phase::Sizing);
        let buy = self.size_side(meta, balances, quotes.bid_price, Side::Buy);
        let sell = self.size_side(meta, balances, quotes.ask_price, Side::Sell);

        self.set_phase(Phase::Submitting);
        for (side, price, volume) in [(Side::Buy, quotes.bid_price, buy), (Side::Sell, quotes.ask_price, sell)] {
            let Some(volume) = volume else { continue };
            self.checkpoint()?;
            self.submit(pair, side, price, volume, report).await?;
        }
        Ok(())
    }

    fn size_side(&self, meta: &PairMeta, balances: &BalanceBook, price: Decimal, side: Side) -> Option<Decimal> {
        let pair = meta.pair.as_str();
        let raw = match order_volume(meta, balances, price, side, self.cfg.order_size_percentage) {
            Ok(v) => v,
            Err(SizingError::UnknownAsset(asset)) => {
                warn!(%pair, %side, %asset, "no balance record, treating as zero");
                return None;
            }
            Err(e) => {
                warn!(%pair, %side, %e, "cannot size order");
                return None;
            }
        };
        match finalize_volume(raw, meta, self.cfg.volume_precision) {
            Ok(v) => Some(v),
            Err(e) => {
                info!(%pair, %side, %e, "not placing order this cycle");
                None
            }
        }
    }

    async fn submit(
        &mut self,
        pair: &str,
        side: Side,
        price: Decimal,
        volume: Decimal,
        report: &mut CycleReport,
    ) -> Result<(), Halt> {
        let req = OrderRequest {
            pair: pair.to_string(),
            side,
            price,
            volume,
            post_only: self.cfg.post_only,
            client_order_id: new_client_order_id(),
        };
        match self.gw.post_limit_order(&req).await {
            Ok(order_id) => {
                info!(%pair, %side, %volume, %price, %order_id, "created order");
                ORDERS_PLACED.with_label_values(&[pair, side.venue_type()]).inc();
                self.registry.insert(TrackedOrder {
                    order_id,
                    pair: req.pair,
                    side,
                    price,
                    volume,
                    created_at: Utc::now(),
                });
                report.orders_placed += 1;
            }
            Err(e) => {
                let e = recoverable(e)?;
                error!(op = %Operation::PlaceOrder, %pair, %side, %e, "failed to create order");
                ORDERS_FAILED.with_label_values(&[pair, side.venue_type()]).inc();
                report.fail(Operation::PlaceOrder, pair, &e);
            }
        }
        Ok(())
    }

    /// Cancel everything resting for `pair`. The venue listing is authoritative;
    /// tracked orders it no longer shows were filled or cancelled elsewhere.
    async fn cancel_pair_orders(&mut self, pair: &str, report: &mut CycleReport) -> Result<(), Halt> {
        let ids = match self.gw.open_orders(Some(pair)).await {
            Ok(orders) => {
                let live: Vec<String> = orders.into_iter().map(|o| o.order_id).collect();
                for id in self.registry.ids_for_pair(pair) {
                    if !live.contains(&id) {
                        debug!(%pair, order_id = %id, "no longer open on venue");
                        self.registry.remove(&id);
                    }
                }
                live
            }
            Err(e) => {
                let e = recoverable(e)?;
                warn!(op = %Operation::ListOrders, %pair, %e, "listing failed, cancelling tracked orders only");
                report.fail(Operation::ListOrders, pair, &e);
                self.registry.ids_for_pair(pair)
            }
        };

        for id in ids {
            match self.gw.stop_order(&id).await {
                Ok(()) => {
                    info!(%pair, order_id = %id, "cancelled order");
                    CANCELS.with_label_values(&["ok"]).inc();
                    self.registry.remove(&id);
                    report.orders_cancelled += 1;
                }
                Err(e) => {
                    let e = recoverable(e)?;
                    warn!(op = %Operation::CancelOrder, %pair, order_id = %id, %e, "failed to cancel order");
                    CANCELS.with_label_values(&["failed"]).inc();
                    report.fail(Operation::CancelOrder, pair, &e);
                }
            }
        }
        Ok(())
    }

    /// Best-effort cancel of every outstanding order: tracked ones first, then
    /// whatever the venue still lists for the account.
    pub async fn shutdown_sweep(&mut self) -> SweepReport {
        self.set_phase(Phase::Shutdown);
        let mut sweep = SweepReport::default();
        let mut attempted: Vec<String> = Vec::new();

        let tracked = self.registry.all_ids();
        info!(tracked = tracked.len(), "cancelling all outstanding orders");
        for id in tracked {
            self.sweep_one(&id, &mut sweep).await;
            attempted.push(id);
        }

        match self.gw.open_orders(None).await {
            Ok(orders) => {
                for o in orders.into_iter().filter(|o| !attempted.contains(&o.order_id)) {
                    self.sweep_one(&o.order_id, &mut sweep).await;
                }
            }
            Err(e) => {
                error!(%e, "could not list open orders during shutdown");
                sweep.listing_failed = true;
            }
        }

        if !self.registry.is_empty() || !sweep.failed.is_empty() || sweep.listing_failed {
            error!(
                failed = ?sweep.failed,
                still_tracked = self.registry.len(),
                oldest_tracked = ?self.registry.oldest(),
                "orders may still be resting on the venue, verify manually"
            );
        } else {
            info!(cancelled = sweep.cancelled, "shutdown sweep complete");
        }
        sweep
    }

    async fn sweep_one(&mut self, order_id: &str, sweep: &mut SweepReport) {
        match self.gw.stop_order(order_id).await {
            Ok(()) => {
                CANCELS.with_label_values(&["ok"]).inc();
                self.registry.remove(order_id);
                sweep.cancelled += 1;
            }
            Err(e) => {
                warn!(%order_id, %e, "failed to cancel order during shutdown");
                CANCELS.with_label_values(&["failed"]).inc();
                sweep.failed.push(order_id.to_string());
            }
        }
    }
}
