// ===============================
// src/gateway.rs (venue seam)
// ===============================
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Balance, OpenOrder, OrderBook, OrderRequest, PairMeta, TickerSnapshot};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network / HTTP level failure (connect, timeout, broken body)
    #[error("transport error: {0}")]
    Transport(String),
    /// Venue answered with a non-success status
    #[error("venue rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("unexpected payload: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Credentials revoked / invalid: tidak ada gunanya lanjut loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Rejected { status: 401 | 403, .. })
    }

    pub fn is_transport(&self) -> bool { matches!(self, GatewayError::Transport(_)) }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() { GatewayError::Decode(e.to_string()) } else { GatewayError::Transport(e.to_string()) }
    }
}

/// Authenticated request/response exchange with the venue.
/// Every call is one round trip; callers decide what a failure means.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn markets(&self) -> Result<Vec<PairMeta>, GatewayError>;
    async fn balances(&self) -> Result<Vec<Balance>, GatewayError>;
    async fn ticker(&self, pair: &str) -> Result<TickerSnapshot, GatewayError>;
    async fn order_book(&self, pair: &str) -> Result<OrderBook, GatewayError>;
    /// Returns the venue-assigned order id
    async fn post_limit_order(&self, req: &OrderRequest) -> Result<String, GatewayError>;
    async fn stop_order(&self, order_id: &str) -> Result<(), GatewayError>;
    async fn open_orders(&self, pair: Option<&str>) -> Result<Vec<OpenOrder>, GatewayError>;
}

#[cfg(test)]
pub mod mock {
    //! In-memory venue with scripted failures.
    use super::*;
    use crate::shutdown::Shutdown;
    use rust_decimal::Decimal;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct State {
        next_id: u64,
        open: Vec<OpenOrder>,
        posted: Vec<OrderRequest>,
        stopped: Vec<String>,
        ticker_calls: Vec<String>,
    }

    #[derive(Default)]
    pub struct MockGateway {
        pub markets: Vec<PairMeta>,
        pub balances: Vec<Balance>,
        pub tickers: HashMap<String, TickerSnapshot>,
        pub book: OrderBook,
        pub fail_balances: bool,
        pub fail_ticker: HashSet<String>,
        pub reject_post: HashSet<(String, &'static str)>,
        pub fail_stop: HashSet<String>,
        pub fail_listing: bool,
        pub unauthorized_ticker: bool,
        /// Trigger shutdown when the ticker for this pair is requested
        pub interrupt_on_ticker: Option<(String, Shutdown)>,
        state: Mutex<State>,
    }

    impl MockGateway {
        pub fn seed_open_order(&self, order_id: &str, pair: &str) {
            self.state.lock().unwrap().open.push(OpenOrder {
                order_id: order_id.to_string(),
                pair: pair.to_string(),
                side: None,
                price: None,
                volume: None,
                state: "PENDING".into(),
                created_at: None,
            });
        }

        pub fn posted(&self) -> Vec<OrderRequest> { self.state.lock().unwrap().posted.clone() }
        pub fn stopped(&self) -> Vec<String> { self.state.lock().unwrap().stopped.clone() }
        pub fn open_ids(&self) -> Vec<String> {
            self.state.lock().unwrap().open.iter().map(|o| o.order_id.clone()).collect()
        }
        pub fn ticker_calls(&self) -> Vec<String> { self.state.lock().unwrap().ticker_calls.clone() }
    }

    #[async_trait]
    impl Gateway for MockGateway {
        async fn markets(&self) -> Result<Vec<PairMeta>, GatewayError> { Ok(self.markets.clone()) }

        async fn balances(&self) -> Result<Vec<Balance>, GatewayError> {
            if self.fail_balances {
                return Err(GatewayError::Transport("connection reset".into()));
            }
            Ok(self.balances.clone())
        }

        async fn ticker(&self, pair: &str) -> Result<TickerSnapshot, GatewayError> {
            self.state.lock().unwrap().ticker_calls.push(pair.to_string());
            if let Some((p, shutdown)) = &self.interrupt_on_ticker {
                if p == pair {
                    shutdown.trigger();
                }
            }
            if self.unauthorized_ticker {
                return Err(GatewayError::Rejected { status: 401, body: "ErrAPIKeyRevoked".into() });
            }
            if self.fail_ticker.contains(pair) {
                return Err(GatewayError::Transport("operation timed out".into()));
            }
            self.tickers
                .get(pair)
                .cloned()
                .ok_or_else(|| GatewayError::Rejected { status: 404, body: "ErrMarketNotFound".into() })
        }

        async fn order_book(&self, _pair: &str) -> Result<OrderBook, GatewayError> { Ok(self.book.clone()) }

        async fn post_limit_order(&self, req: &OrderRequest) -> Result<String, GatewayError> {
            if self.reject_post.contains(&(req.pair.clone(), req.side.venue_type())) {
                return Err(GatewayError::Rejected { status: 400, body: "ErrPostOnlyNotAllowed".into() });
            }
            let mut st = self.state.lock().unwrap();
            st.next_id += 1;
            let id = format!("OID{}", st.next_id);
            st.posted.push(req.clone());
            st.open.push(OpenOrder {
                order_id: id.clone(),
                pair: req.pair.clone(),
                side: Some(req.side),
                price: Some(req.price),
                volume: Some(req.volume),
                state: "PENDING".into(),
                created_at: None,
            });
            Ok(id)
        }

        async fn stop_order(&self, order_id: &str) -> Result<(), GatewayError> {
            let mut st = self.state.lock().unwrap();
            st.stopped.push(order_id.to_string());
            if self.fail_stop.contains(order_id) {
                return Err(GatewayError::Transport("connection reset".into()));
            }
            st.open.retain(|o| o.order_id != order_id);
            Ok(())
        }

        async fn open_orders(&self, pair: Option<&str>) -> Result<Vec<OpenOrder>, GatewayError> {
            if self.fail_listing {
                return Err(GatewayError::Rejected { status: 500, body: "internal".into() });
            }
            let st = self.state.lock().unwrap();
            Ok(st
                .open
                .iter()
                .filter(|o| pair.map_or(true, |p| o.pair == p))
                .cloned()
                .collect())
        }
    }

    pub fn meta(pair: &str, base: &str, counter: &str) -> PairMeta {
        PairMeta {
            pair: pair.to_string(),
            base: base.to_string(),
            counter: counter.to_string(),
            min_volume: Decimal::new(1, 6),
            max_volume: None,
            price_scale: None,
            volume_scale: None,
            trading_status: "ACTIVE".into(),
        }
    }

    pub fn ticker(pair: &str, bid: Decimal, ask: Decimal) -> TickerSnapshot {
        TickerSnapshot { pair: pair.to_string(), bid: Some(bid), ask: Some(ask), ..Default::default() }
    }
}
