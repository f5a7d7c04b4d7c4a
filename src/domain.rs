// ===============================
// src/domain.rs
// ===============================
use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side { Buy, Sell }

impl Side {
    /// Luno order type: BID untuk beli, ASK untuk jual
    pub fn venue_type(&self) -> &'static str { match self { Side::Buy => "BID", Side::Sell => "ASK" } }

    pub fn from_venue_type(s: &str) -> Option<Side> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BID" | "BUY" => Some(Side::Buy),
            "ASK" | "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Side::Buy => "buy", Side::Sell => "sell" })
    }
}

/// Ticker snapshot. Field numerik opsional: venue bisa kirim kosong / non-numeric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerSnapshot {
    pub pair: String,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub last_trade: Option<Decimal>,
    pub rolling_24_hour_volume: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Balance { pub asset: String, pub total: Decimal, pub reserved: Decimal }

impl Balance {
    /// total - reserved, clamped at zero
    pub fn available(&self) -> Decimal { (self.total - self.reserved).max(Decimal::ZERO) }
}

/// Balances keyed by asset code. Luno can return several accounts per asset,
/// those are summed.
#[derive(Debug, Clone, Default)]
pub struct BalanceBook { by_asset: HashMap<String, Balance> }

impl BalanceBook {
    pub fn new(balances: Vec<Balance>) -> Self {
        let mut by_asset: HashMap<String, Balance> = HashMap::new();
        for b in balances {
            by_asset
                .entry(b.asset.clone())
                .and_modify(|acc| {
                    acc.total += b.total;
                    acc.reserved += b.reserved;
                })
                .or_insert(b);
        }
        Self { by_asset }
    }

    pub fn get(&self, asset: &str) -> Option<&Balance> { self.by_asset.get(asset) }

    pub fn available(&self, asset: &str) -> Option<Decimal> { self.get(asset).map(Balance::available) }

    pub fn len(&self) -> usize { self.by_asset.len() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotePair { pub bid_price: Decimal, pub ask_price: Decimal }

/// Market metadata from the venue listing. Base/counter are explicit, never sliced
/// out of the pair symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PairMeta {
    pub pair: String,
    pub base: String,
    pub counter: String,
    pub min_volume: Decimal,
    pub max_volume: Option<Decimal>,
    pub price_scale: Option<u32>,
    pub volume_scale: Option<u32>,
    pub trading_status: String,
}

impl PairMeta {
    /// ACTIVE dan POST_ONLY tetap boleh pasang limit order post-only
    pub fn is_tradable(&self) -> bool {
        matches!(self.trading_status.to_ascii_uppercase().as_str(), "ACTIVE" | "POST_ONLY")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub pair: String,
    pub side: Side,
    pub price: Decimal,
    pub volume: Decimal,
    pub post_only: bool,
    pub client_order_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub order_id: String,
    pub pair: String,
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub state: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookLevel { pub price: Decimal, pub volume: Decimal }

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook { pub bids: Vec<BookLevel>, pub asks: Vec<BookLevel> }

/// Order yang sudah diterima venue, disimpan di registry sampai dibatalkan
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedOrder {
    pub order_id: String,
    pub pair: String,
    pub side: Side,
    pub price: Decimal,
    pub volume: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn available_is_clamped_at_zero() {
        let b = Balance { asset: "ZAR".into(), total: dec!(10), reserved: dec!(12) };
        assert_eq!(b.available(), Decimal::ZERO);
    }

    #[test]
    fn balance_book_sums_accounts_of_same_asset() {
        let book = BalanceBook::new(vec![
            Balance { asset: "XBT".into(), total: dec!(0.03), reserved: dec!(0.01) },
            Balance { asset: "XBT".into(), total: dec!(0.02), reserved: dec!(0) },
            Balance { asset: "ZAR".into(), total: dec!(10000), reserved: dec!(0) },
        ]);
        assert_eq!(book.len(), 2);
        assert_eq!(book.available("XBT"), Some(dec!(0.04)));
        assert_eq!(book.available("ETH"), None);
    }

    #[test]
    fn side_maps_to_venue_types() {
        assert_eq!(Side::Buy.venue_type(), "BID");
        assert_eq!(Side::from_venue_type("ask"), Some(Side::Sell));
        assert_eq!(Side::from_venue_type("STOP"), None);
    }

    #[test]
    fn post_only_market_is_tradable() {
        let mut meta = PairMeta {
            pair: "XBTZAR".into(),
            base: "XBT".into(),
            counter: "ZAR".into(),
            min_volume: dec!(0.0005),
            max_volume: None,
            price_scale: Some(0),
            volume_scale: Some(6),
            trading_status: "POST_ONLY".into(),
        };
        assert!(meta.is_tradable());
        meta.trading_status = "SUSPENDED".into();
        assert!(!meta.is_tradable());
    }
}
