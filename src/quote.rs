// ===============================
// src/quote.rs
// ===============================
//
// Quote calculator: ticker -> (bid, ask) simetris di sekitar mid.
//   mid         = (bid + ask) / 2
//   half_spread = mid * spread_pct / 100
//   bid_quote   = round(mid - half_spread, p)
//   ask_quote   = round(mid + half_spread, p)
// Rounding: half-to-even (default rust_decimal).
//
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{QuotePair, TickerSnapshot};

#[derive(Debug, Error, PartialEq)]
pub enum QuoteError {
    #[error("invalid market data for {pair}: {reason}")]
    InvalidMarketData { pair: String, reason: &'static str },
}

pub fn mid_price(bid: Decimal, ask: Decimal) -> Decimal {
    (bid + ask) / Decimal::TWO
}

/// Best bid/ask from a ticker, rejecting missing, non-positive or crossed books.
pub fn top_of_book(t: &TickerSnapshot) -> Result<(Decimal, Decimal), QuoteError> {
    let invalid = |reason| QuoteError::InvalidMarketData { pair: t.pair.clone(), reason };
    let bid = t.bid.ok_or_else(|| invalid("bid missing or not numeric"))?;
    let ask = t.ask.ok_or_else(|| invalid("ask missing or not numeric"))?;
    if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
        return Err(invalid("empty side of book"));
    }
    if bid > ask {
        return Err(invalid("crossed book (bid > ask)"));
    }
    Ok((bid, ask))
}

pub fn compute_quotes(
    t: &TickerSnapshot,
    spread_percentage: Decimal,
    price_precision: u32,
) -> Result<QuotePair, QuoteError> {
    let (bid, ask) = top_of_book(t)?;
    let mid = mid_price(bid, ask);
    let half_spread = mid * spread_percentage / Decimal::ONE_HUNDRED;
    Ok(QuotePair {
        bid_price: (mid - half_spread).round_dp(price_precision),
        ask_price: (mid + half_spread).round_dp(price_precision),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker(bid: Option<Decimal>, ask: Option<Decimal>) -> TickerSnapshot {
        TickerSnapshot { pair: "XBTZAR".into(), bid, ask, ..Default::default() }
    }

    #[test]
    fn xbtzar_example() {
        let q = compute_quotes(&ticker(Some(dec!(1000000)), Some(dec!(1002000))), dec!(0.5), 0).unwrap();
        assert_eq!(q.bid_price, dec!(995995));
        assert_eq!(q.ask_price, dec!(1006005));
    }

    #[test]
    fn quotes_bracket_mid_and_width_is_twice_half_spread() {
        let cases = [
            (dec!(100), dec!(100), dec!(0)),
            (dec!(0.0312), dec!(0.0315), dec!(1.25)),
            (dec!(18250.5), dec!(18301.75), dec!(0.5)),
            (dec!(1), dec!(3), dec!(10)),
        ];
        for (bid, ask, spread) in cases {
            let q = compute_quotes(&ticker(Some(bid), Some(ask)), spread, 8).unwrap();
            let mid = mid_price(bid, ask);
            assert!(q.bid_price <= mid && mid <= q.ask_price);
            let width = q.ask_price - q.bid_price;
            let expected = mid * spread * Decimal::TWO / Decimal::ONE_HUNDRED;
            assert!((width - expected).abs() <= dec!(0.00000002), "width {width} vs {expected}");
        }
    }

    #[test]
    fn same_input_same_output() {
        let t = ticker(Some(dec!(41.27)), Some(dec!(41.31)));
        assert_eq!(compute_quotes(&t, dec!(0.5), 2), compute_quotes(&t, dec!(0.5), 2));
    }

    #[test]
    fn zero_spread_quotes_at_mid() {
        let q = compute_quotes(&ticker(Some(dec!(10)), Some(dec!(12))), Decimal::ZERO, 0).unwrap();
        assert_eq!(q.bid_price, dec!(11));
        assert_eq!(q.ask_price, dec!(11));
    }

    #[test]
    fn rounding_is_half_to_even() {
        // mid = 2.5, zero spread -> 2
        let q = compute_quotes(&ticker(Some(dec!(2)), Some(dec!(3))), Decimal::ZERO, 0).unwrap();
        assert_eq!(q.bid_price, dec!(2));
    }

    #[test]
    fn missing_or_bad_fields_are_invalid_market_data() {
        for t in [
            ticker(None, Some(dec!(1))),
            ticker(Some(dec!(1)), None),
            ticker(Some(dec!(0)), Some(dec!(1))),
            ticker(Some(dec!(5)), Some(dec!(4))),
        ] {
            assert!(matches!(
                compute_quotes(&t, dec!(0.5), 0),
                Err(QuoteError::InvalidMarketData { .. })
            ));
        }
    }
}
