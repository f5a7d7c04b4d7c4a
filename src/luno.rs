// ===============================
// src/luno.rs
// ===============================
//
// Model JSON minimal untuk Luno REST API + konversi ke domain.
// Semua angka dari Luno dikirim sebagai string ("1000000.00").
//
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::domain::{Balance, BookLevel, OpenOrder, OrderBook, PairMeta, Side, TickerSnapshot};

/// Parse string/number JSON jadi Decimal; nilai kosong atau non-numeric -> None.
fn lenient_decimal<'de, D>(de: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(de)?;
    Ok(raw.and_then(|v| match v {
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }))
}

fn ms_to_utc(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

// ---- balances ----
#[derive(Debug, Deserialize)]
pub struct BalancesResponse {
    #[serde(default)]
    pub balance: Option<Vec<AccountBalance>>,
}

#[derive(Debug, Deserialize)]
pub struct AccountBalance {
    pub asset: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub balance: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub reserved: Option<Decimal>,
}

impl From<AccountBalance> for Balance {
    fn from(a: AccountBalance) -> Self {
        Balance {
            asset: a.asset,
            total: a.balance.unwrap_or_default(),
            reserved: a.reserved.unwrap_or_default(),
        }
    }
}

// ---- ticker ----
#[derive(Debug, Deserialize)]
pub struct TickerResponse {
    #[serde(default)]
    pub pair: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub bid: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub ask: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub last_trade: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub rolling_24_hour_volume: Option<Decimal>,
}

impl TickerResponse {
    pub fn into_snapshot(self, requested_pair: &str) -> TickerSnapshot {
        TickerSnapshot {
            pair: if self.pair.is_empty() { requested_pair.to_string() } else { self.pair },
            bid: self.bid,
            ask: self.ask,
            last_trade: self.last_trade,
            rolling_24_hour_volume: self.rolling_24_hour_volume,
        }
    }
}

// ---- order book ----
#[derive(Debug, Deserialize)]
pub struct OrderBookResponse {
    #[serde(default)]
    pub bids: Option<Vec<BookEntry>>,
    #[serde(default)]
    pub asks: Option<Vec<BookEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct BookEntry {
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub volume: Option<Decimal>,
}

fn levels(entries: Option<Vec<BookEntry>>) -> Vec<BookLevel> {
    entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|e| Some(BookLevel { price: e.price?, volume: e.volume? }))
        .collect()
}

impl From<OrderBookResponse> for OrderBook {
    fn from(r: OrderBookResponse) -> Self {
        OrderBook { bids: levels(r.bids), asks: levels(r.asks) }
    }
}

// ---- markets ----
#[derive(Debug, Deserialize)]
pub struct MarketsResponse {
    #[serde(default)]
    pub markets: Option<Vec<MarketInfo>>,
}

#[derive(Debug, Deserialize)]
pub struct MarketInfo {
    pub market_id: String,
    #[serde(default)]
    pub trading_status: String,
    pub base_currency: String,
    pub counter_currency: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub min_volume: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub max_volume: Option<Decimal>,
    #[serde(default)]
    pub volume_scale: Option<u32>,
    #[serde(default)]
    pub price_scale: Option<u32>,
}

impl From<MarketInfo> for PairMeta {
    fn from(m: MarketInfo) -> Self {
        PairMeta {
            pair: m.market_id,
            base: m.base_currency,
            counter: m.counter_currency,
            min_volume: m.min_volume.unwrap_or_default(),
            max_volume: m.max_volume.filter(|v| *v > Decimal::ZERO),
            price_scale: m.price_scale,
            volume_scale: m.volume_scale,
            trading_status: m.trading_status,
        }
    }
}

// ---- orders ----
#[derive(Debug, Deserialize)]
pub struct PostOrderResponse {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StopOrderResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersResponse {
    // Luno kirim `"orders": null` kalau tidak ada order
    #[serde(default)]
    pub orders: Option<Vec<ListedOrder>>,
}

#[derive(Debug, Deserialize)]
pub struct ListedOrder {
    pub order_id: String,
    #[serde(default)]
    pub pair: String,
    #[serde(default, rename = "type")]
    pub order_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, alias = "price", deserialize_with = "lenient_decimal")]
    pub limit_price: Option<Decimal>,
    #[serde(default, alias = "volume", deserialize_with = "lenient_decimal")]
    pub limit_volume: Option<Decimal>,
    #[serde(default)]
    pub creation_timestamp: Option<i64>,
}

impl From<ListedOrder> for OpenOrder {
    fn from(o: ListedOrder) -> Self {
        OpenOrder {
            side: Side::from_venue_type(&o.order_type),
            order_id: o.order_id,
            pair: o.pair,
            price: o.limit_price,
            volume: o.limit_volume,
            state: o.state,
            created_at: ms_to_utc(o.creation_timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ticker_with_garbage_bid_decodes_to_none() {
        let raw = r#"{"pair":"XBTZAR","timestamp":1700000000000,"bid":"n/a","ask":"1002000.00","last_trade":"1001000","rolling_24_hour_volume":"12.5","status":"ACTIVE"}"#;
        let t: TickerResponse = serde_json::from_str(raw).unwrap();
        let snap = t.into_snapshot("XBTZAR");
        assert_eq!(snap.bid, None);
        assert_eq!(snap.ask, Some(dec!(1002000.00)));
        assert_eq!(snap.rolling_24_hour_volume, Some(dec!(12.5)));
    }

    #[test]
    fn ticker_missing_fields_keep_requested_pair() {
        let t: TickerResponse = serde_json::from_str("{}").unwrap();
        let snap = t.into_snapshot("ETHZAR");
        assert_eq!(snap.pair, "ETHZAR");
        assert!(snap.bid.is_none() && snap.ask.is_none());
    }

    #[test]
    fn balances_decode_into_domain() {
        let raw = r#"{"balance":[{"account_id":"1","asset":"ZAR","balance":"10000.00","reserved":"250.00","unconfirmed":"0"}]}"#;
        let r: BalancesResponse = serde_json::from_str(raw).unwrap();
        let b: Vec<Balance> = r.balance.unwrap().into_iter().map(Balance::from).collect();
        assert_eq!(b[0].asset, "ZAR");
        assert_eq!(b[0].available(), dec!(9750.00));
    }

    #[test]
    fn null_order_list_is_empty() {
        let r: ListOrdersResponse = serde_json::from_str(r#"{"orders":null}"#).unwrap();
        assert!(r.orders.unwrap_or_default().is_empty());
    }

    #[test]
    fn listed_order_maps_side_price_and_time() {
        let raw = r#"{"orders":[{"order_id":"BXMC2CJ7HNB88U4","creation_timestamp":1367849297609,"pair":"XBTZAR","type":"BID","state":"PENDING","limit_price":"995995.00","limit_volume":"0.000200"}]}"#;
        let r: ListOrdersResponse = serde_json::from_str(raw).unwrap();
        let o: OpenOrder = r.orders.unwrap().remove(0).into();
        assert_eq!(o.side, Some(Side::Buy));
        assert_eq!(o.price, Some(dec!(995995.00)));
        assert_eq!(o.volume, Some(dec!(0.000200)));
        assert_eq!(o.created_at.unwrap().timestamp_millis(), 1367849297609);
    }

    #[test]
    fn market_info_carries_explicit_assets() {
        let raw = r#"{"markets":[{"market_id":"USDCZAR","trading_status":"ACTIVE","base_currency":"USDC","counter_currency":"ZAR","min_volume":"0.5","max_volume":"0","volume_scale":2,"min_price":"1","max_price":"100","price_scale":2,"fee_scale":8}]}"#;
        let r: MarketsResponse = serde_json::from_str(raw).unwrap();
        let meta: PairMeta = r.markets.unwrap().remove(0).into();
        assert_eq!(meta.base, "USDC");
        assert_eq!(meta.counter, "ZAR");
        assert_eq!(meta.min_volume, dec!(0.5));
        assert_eq!(meta.max_volume, None);
        assert_eq!(meta.price_scale, Some(2));
    }

    #[test]
    fn order_book_drops_malformed_levels() {
        let raw = r#"{"timestamp":1,"bids":[{"price":"1000","volume":"0.1"},{"price":"x","volume":"1"}],"asks":[{"price":"1002","volume":"0.2"}]}"#;
        let r: OrderBookResponse = serde_json::from_str(raw).unwrap();
        let book: OrderBook = r.into();
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.asks[0].price, dec!(1002));
    }
}
