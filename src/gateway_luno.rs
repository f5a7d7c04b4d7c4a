// ===============================
// src/gateway_luno.rs
// ===============================
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::config::Config;
use crate::domain::{Balance, OpenOrder, OrderBook, OrderRequest, PairMeta, TickerSnapshot};
use crate::gateway::{Gateway, GatewayError};
use crate::luno::{
    BalancesResponse, ListOrdersResponse, MarketsResponse, OrderBookResponse, PostOrderResponse,
    StopOrderResponse, TickerResponse,
};

/// Luno REST gateway (HTTP basic auth, form-encoded POSTs).
/// Reads are retried on transport errors; writes are sent exactly once.
pub struct LunoGateway {
    http: reqwest::Client,
    base: String,
    key_id: String,
    secret: String,
    max_read_retries: u32,
}

impl LunoGateway {
    pub fn new(cfg: &Config) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(concat!("luno_mm_bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: cfg.api_url.clone(),
            key_id: cfg.credentials.key_id.clone(),
            secret: cfg.credentials.secret.clone(),
            max_read_retries: cfg.max_read_retries,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        self.http.request(method, url).basic_auth(&self.key_id, Some(&self.secret))
    }

    async fn read_body<T: DeserializeOwned>(rsp: Response) -> Result<T, GatewayError> {
        let status = rsp.status();
        // Luno pakai 200/201/202 untuk sukses
        if !matches!(status.as_u16(), 200 | 201 | 202) {
            let body = rsp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status: status.as_u16(), body });
        }
        let text = rsp.text().await?;
        serde_json::from_str::<T>(&text).map_err(|e| GatewayError::Decode(format!("{e}: {text}")))
    }

    /// GET with retry on transport failure. Exponential backoff + jitter.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, GatewayError> {
        let mut attempt: u32 = 0;
        loop {
            debug!(%path, attempt, "GET");
            let res = match self.request(Method::GET, path).query(query).send().await {
                Ok(rsp) => Self::read_body::<T>(rsp).await,
                Err(e) => Err(GatewayError::from(e)),
            };
            match res {
                Err(e) if e.is_transport() && attempt < self.max_read_retries => {
                    attempt += 1;
                    let shift = attempt.min(6);
                    let base_ms = 500u64.saturating_mul(1u64 << shift); // 1s, 2s, 4s ...
                    let jitter = rand::thread_rng().gen_range(0..=250);
                    // caller logs the final failure once
                    debug!(%path, attempt, %e, "read failed, retrying");
                    sleep(Duration::from_millis(base_ms + jitter)).await;
                }
                other => return other,
            }
        }
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T, GatewayError> {
        debug!(%path, "POST");
        let rsp = self.request(Method::POST, path).form(form).send().await?;
        Self::read_body::<T>(rsp).await
    }
}

#[async_trait]
impl Gateway for LunoGateway {
    async fn markets(&self) -> Result<Vec<PairMeta>, GatewayError> {
        let r: MarketsResponse = self.get_json("/api/exchange/1/markets", &[]).await?;
        Ok(r.markets.unwrap_or_default().into_iter().map(PairMeta::from).collect())
    }

    async fn balances(&self) -> Result<Vec<Balance>, GatewayError> {
        let r: BalancesResponse = self.get_json("/api/1/balance", &[]).await?;
        Ok(r.balance.unwrap_or_default().into_iter().map(Balance::from).collect())
    }

    async fn ticker(&self, pair: &str) -> Result<TickerSnapshot, GatewayError> {
        let r: TickerResponse = self.get_json("/api/1/ticker", &[("pair", pair)]).await?;
        Ok(r.into_snapshot(pair))
    }

    async fn order_book(&self, pair: &str) -> Result<OrderBook, GatewayError> {
        let r: OrderBookResponse = self.get_json("/api/1/orderbook_top", &[("pair", pair)]).await?;
        Ok(r.into())
    }

    async fn post_limit_order(&self, req: &OrderRequest) -> Result<String, GatewayError> {
        // Price & volume sudah dibulatkan ke scale pair oleh caller
        let form = [
            ("pair", req.pair.clone()),
            ("type", req.side.venue_type().to_string()),
            ("volume", req.volume.normalize().to_string()),
            ("price", req.price.normalize().to_string()),
            ("post_only", req.post_only.to_string()),
            ("client_order_id", req.client_order_id.clone()),
        ];
        let r: PostOrderResponse = self.post_form("/api/1/postorder", &form).await?;
        Ok(r.order_id)
    }

    async fn stop_order(&self, order_id: &str) -> Result<(), GatewayError> {
        let r: StopOrderResponse = self.post_form("/api/1/stoporder", &[("order_id", order_id.to_string())]).await?;
        if r.success {
            Ok(())
        } else {
            Err(GatewayError::Rejected { status: 200, body: format!("stoporder {order_id}: success=false") })
        }
    }

    async fn open_orders(&self, pair: Option<&str>) -> Result<Vec<OpenOrder>, GatewayError> {
        let mut query: Vec<(&str, &str)> = vec![("state", "PENDING")];
        if let Some(p) = pair {
            query.push(("pair", p));
        }
        let r: ListOrdersResponse = self.get_json("/api/1/listorders", &query).await?;
        Ok(r.orders.unwrap_or_default().into_iter().map(OpenOrder::from).collect())
    }
}
