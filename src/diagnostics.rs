// ===============================
// src/diagnostics.rs (read-only checks)
// ===============================
//
// Subcommand balances / market / sizes / orders. Tidak pernah submit atau
// cancel order; aman dijalankan dengan key production.
//
use rust_decimal::Decimal;
use tracing::warn;

use crate::config::{normalize_pair, Config};
use crate::domain::{Balance, BalanceBook, OpenOrder, OrderBook, PairMeta, QuotePair, Side, TickerSnapshot};
use crate::error::BotError;
use crate::gateway::{Gateway, GatewayError};
use crate::quote::{compute_quotes, mid_price, top_of_book, QuoteError};
use crate::refresh::resolve_pairs;
use crate::sizer::{order_volume, SizingError};

fn header(title: &str) -> Vec<String> {
    vec![String::new(), "=".repeat(80), format!(" {title}"), "=".repeat(80)]
}

fn or_na(v: Option<Decimal>) -> String {
    v.map_or_else(|| "N/A".to_string(), |d| d.to_string())
}

/// Non-zero balances, largest first.
pub fn render_balances(balances: &[Balance]) -> String {
    let mut rows: Vec<&Balance> = balances.iter().filter(|b| b.total > Decimal::ZERO).collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.asset.cmp(&b.asset)));

    let mut out = header("ACCOUNT BALANCES");
    out.push(format!("{:<10} {:<20} {:<20} {:<20}", "Asset", "Balance", "Reserved", "Available"));
    out.push("-".repeat(70));
    for b in rows {
        out.push(format!(
            "{:<10} {:<20} {:<20} {:<20}",
            b.asset,
            format!("{:.8}", b.total),
            format!("{:.8}", b.reserved),
            format!("{:.8}", b.available()),
        ));
    }
    out.join("\n")
}

pub fn render_market(
    t: &TickerSnapshot,
    quotes: Result<QuotePair, QuoteError>,
    book: Option<&OrderBook>,
    depth: usize,
) -> String {
    let mut out = header(&format!("MARKET DATA FOR {}", t.pair));
    out.push("Ticker:".into());
    out.push(format!("  Last trade: {}", or_na(t.last_trade)));
    out.push(format!("  Bid: {}", or_na(t.bid)));
    out.push(format!("  Ask: {}", or_na(t.ask)));
    out.push(format!("  24h volume: {}", or_na(t.rolling_24_hour_volume)));

    out.push("Market making prices:".into());
    match quotes {
        Ok(q) => {
            out.push(format!("  Bid (buy) price: {}", q.bid_price));
            out.push(format!("  Ask (sell) price: {}", q.ask_price));
        }
        Err(e) => out.push(format!("  unavailable: {e}")),
    }

    out.push(format!("Order book (top {depth}):"));
    match book {
        Some(b) => {
            out.push("  Asks:".into());
            out.extend(b.asks.iter().take(depth).map(|l| format!("    {} @ {}", l.volume, l.price)));
            out.push("  Bids:".into());
            out.extend(b.bids.iter().take(depth).map(|l| format!("    {} @ {}", l.volume, l.price)));
        }
        None => out.push("  unavailable".into()),
    }
    out.join("\n")
}

/// Buy/sell sizes a refresh would compute if it quoted at `mid`.
pub fn render_sizes(
    pair: &str,
    mid: Decimal,
    buy: &Result<Decimal, SizingError>,
    sell: &Result<Decimal, SizingError>,
) -> String {
    let show = |side: Side, r: &Result<Decimal, SizingError>| match r {
        Ok(v) => format!("{side} order size at price {mid}: {v:.8}"),
        Err(e) => format!("{side} order size at price {mid}: n/a ({e})"),
    };
    let mut out = header(&format!("ORDER SIZE CALCULATION FOR {pair}"));
    out.push(show(Side::Buy, buy));
    out.push(show(Side::Sell, sell));
    out.join("\n")
}

pub fn render_open_orders(pair: Option<&str>, orders: &[OpenOrder]) -> String {
    let title = match pair {
        Some(p) => format!("OPEN ORDERS FOR {p}"),
        None => "OPEN ORDERS".to_string(),
    };
    let mut out = header(&title);
    if orders.is_empty() {
        out.push("No open orders found.".into());
    }
    for o in orders {
        out.push(format!("Order ID: {}", o.order_id));
        out.push(format!("  Pair: {}", o.pair));
        out.push(format!("  Type: {}", o.side.map_or("N/A", |s| s.venue_type())));
        out.push(format!("  Price: {}", or_na(o.price)));
        out.push(format!("  Volume: {}", or_na(o.volume)));
        out.push(format!("  State: {}", o.state));
        out.push(format!(
            "  Created: {}",
            o.created_at.map_or_else(|| "N/A".to_string(), |t| t.to_rfc3339())
        ));
    }
    out.join("\n")
}

/// Pairs to inspect: `--pair` if given, else every configured pair.
pub async fn select_pairs<G: Gateway>(gw: &G, cfg: &Config, pair: Option<&str>) -> Result<Vec<PairMeta>, BotError> {
    let wanted: Vec<String> = match pair {
        Some(p) => vec![normalize_pair(p)],
        None => cfg.pairs.clone(),
    };
    let (resolved, missing) = resolve_pairs(&wanted, gw.markets().await?);
    if !missing.is_empty() {
        warn!(?missing, "pairs not listed by venue");
    }
    if resolved.is_empty() {
        return Err(BotError::NoPairs(missing));
    }
    Ok(resolved)
}

pub async fn check_balances<G: Gateway>(gw: &G) -> Result<String, GatewayError> {
    Ok(render_balances(&gw.balances().await?))
}

/// Ticker failures are reported inline so one bad pair does not hide the rest.
pub async fn check_market<G: Gateway>(gw: &G, cfg: &Config, pairs: &[PairMeta], depth: usize) -> String {
    let mut sections = Vec::with_capacity(pairs.len());
    for meta in pairs {
        let t = match gw.ticker(&meta.pair).await {
            Ok(t) => t,
            Err(e) => {
                sections.push(format!("{}\n  ticker unavailable: {e}", header(&format!("MARKET DATA FOR {}", meta.pair)).join("\n")));
                continue;
            }
        };
        let precision = meta.price_scale.unwrap_or(cfg.price_precision);
        let quotes = compute_quotes(&t, cfg.spread_percentage, precision);
        let book = match gw.order_book(&meta.pair).await {
            Ok(b) => Some(b),
            Err(e) => {
                warn!(pair = %meta.pair, %e, "order book unavailable");
                None
            }
        };
        sections.push(render_market(&t, quotes, book.as_ref(), depth));
    }
    sections.join("\n")
}

pub async fn check_sizes<G: Gateway>(gw: &G, cfg: &Config, pairs: &[PairMeta]) -> Result<String, GatewayError> {
    let balances = BalanceBook::new(gw.balances().await?);
    let mut sections = Vec::with_capacity(pairs.len());
    for meta in pairs {
        let mid = match gw.ticker(&meta.pair).await.map_err(|e| e.to_string()).and_then(|t| {
            top_of_book(&t).map(|(b, a)| mid_price(b, a)).map_err(|e| e.to_string())
        }) {
            Ok(m) => m,
            Err(reason) => {
                sections.push(format!(
                    "{}\nCould not calculate order sizes: {reason}",
                    header(&format!("ORDER SIZE CALCULATION FOR {}", meta.pair)).join("\n")
                ));
                continue;
            }
        };
        let buy = order_volume(meta, &balances, mid, Side::Buy, cfg.order_size_percentage);
        let sell = order_volume(meta, &balances, mid, Side::Sell, cfg.order_size_percentage);
        sections.push(render_sizes(&meta.pair, mid, &buy, &sell));
    }
    Ok(sections.join("\n"))
}

pub async fn check_orders<G: Gateway>(gw: &G, pair: Option<&str>) -> Result<String, GatewayError> {
    let pair = pair.map(normalize_pair);
    let orders = gw.open_orders(pair.as_deref()).await?;
    Ok(render_open_orders(pair.as_deref(), &orders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookLevel;
    use crate::gateway::mock::{meta, ticker, MockGateway};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn config() -> Config {
        let vars: HashMap<&str, &str> = [("LUNO_API_KEY_ID", "id"), ("LUNO_API_SECRET", "s")].into_iter().collect();
        Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
    }

    fn bal(asset: &str, total: Decimal, reserved: Decimal) -> Balance {
        Balance { asset: asset.into(), total, reserved }
    }

    #[test]
    fn balances_hide_zero_rows_and_sort_descending() {
        let text = render_balances(&[
            bal("XBT", dec!(0.5), dec!(0.1)),
            bal("ETH", dec!(0), dec!(0)),
            bal("ZAR", dec!(1500), dec!(0)),
        ]);
        assert!(!text.contains("ETH"));
        let zar = text.find("ZAR").unwrap();
        let xbt = text.find("XBT").unwrap();
        assert!(zar < xbt);
        assert!(text.contains("0.40000000"));
    }

    #[test]
    fn market_view_shows_quotes_and_limited_depth() {
        let t = ticker("XBTZAR", dec!(1000000), dec!(1002000));
        let q = compute_quotes(&t, dec!(0.5), 0);
        let lvl = |p| BookLevel { price: p, volume: dec!(0.1) };
        let book = OrderBook {
            bids: vec![lvl(dec!(1000000)), lvl(dec!(999000)), lvl(dec!(998000))],
            asks: vec![lvl(dec!(1002000))],
        };
        let text = render_market(&t, q, Some(&book), 2);
        assert!(text.contains("Bid (buy) price: 995995"));
        assert!(text.contains("Ask (sell) price: 1006005"));
        assert!(text.contains("Last trade: N/A"));
        assert!(text.contains("999000"));
        assert!(!text.contains("998000"));
    }

    #[test]
    fn empty_order_list_says_so() {
        assert!(render_open_orders(Some("XBTZAR"), &[]).contains("No open orders found."));
    }

    #[tokio::test]
    async fn sizes_are_computed_at_mid() {
        let mut gw = MockGateway::default();
        gw.balances = vec![bal("ZAR", dec!(10000), dec!(0)), bal("XBT", dec!(0.05), dec!(0))];
        gw.tickers.insert("XBTZAR".into(), ticker("XBTZAR", dec!(999000), dec!(1001000)));
        let cfg = config();
        let text = check_sizes(&gw, &cfg, &[meta("XBTZAR", "XBT", "ZAR")]).await.unwrap();
        // 10000 * 2% / 1000000
        let line = |side: &str| text.lines().find(|l| l.starts_with(side)).unwrap().to_string();
        assert!(line("buy order size").ends_with(": 0.00020000"), "{text}");
        assert!(line("sell order size").ends_with(": 0.00100000"), "{text}");
    }

    #[tokio::test]
    async fn market_check_reports_failed_ticker_inline() {
        let mut gw = MockGateway::default();
        gw.tickers.insert("XBTZAR".into(), ticker("XBTZAR", dec!(100), dec!(101)));
        gw.fail_ticker.insert("ETHZAR".into());
        let cfg = config();
        let pairs = [meta("ETHZAR", "ETH", "ZAR"), meta("XBTZAR", "XBT", "ZAR")];
        let text = check_market(&gw, &cfg, &pairs, 5).await;
        assert!(text.contains("ticker unavailable"));
        assert!(text.contains("MARKET DATA FOR XBTZAR"));
    }

    #[tokio::test]
    async fn orders_pair_flag_is_normalized() {
        let gw = MockGateway::default();
        gw.seed_open_order("OID1", "XBTZAR");
        gw.seed_open_order("OID2", "ETHZAR");
        let text = check_orders(&gw, Some("xbt-zar")).await.unwrap();
        assert!(text.contains("OPEN ORDERS FOR XBTZAR"), "{text}");
        assert!(text.contains("OID1"));
        assert!(!text.contains("OID2"));
    }

    #[tokio::test]
    async fn pair_flag_is_normalized_against_listing() {
        let mut gw = MockGateway::default();
        gw.markets = vec![meta("XBTZAR", "XBT", "ZAR"), meta("ETHZAR", "ETH", "ZAR")];
        let cfg = config();
        let pairs = select_pairs(&gw, &cfg, Some("xbt-zar")).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pair, "XBTZAR");
        assert!(matches!(select_pairs(&gw, &cfg, Some("DOGEZAR")).await, Err(BotError::NoPairs(_))));
    }
}
