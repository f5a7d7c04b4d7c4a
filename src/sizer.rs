// ===============================
// src/sizer.rs
// ===============================
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::domain::{BalanceBook, PairMeta, Side};

#[derive(Debug, Error, PartialEq)]
pub enum SizingError {
    #[error("no balance record for {0}")]
    UnknownAsset(String),
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),
    #[error("computed volume rounds to zero")]
    ZeroSizeOrder,
    #[error("volume {volume} below venue minimum {min}")]
    BelowMinimum { volume: Decimal, min: Decimal },
}

/// Raw order size from available balance.
///   BUY : (available counter * pct / 100) / price
///   SELL: available base * pct / 100
pub fn order_volume(
    meta: &PairMeta,
    balances: &BalanceBook,
    price: Decimal,
    side: Side,
    size_percentage: Decimal,
) -> Result<Decimal, SizingError> {
    if price <= Decimal::ZERO {
        return Err(SizingError::NonPositivePrice(price));
    }
    let share = size_percentage / Decimal::ONE_HUNDRED;
    match side {
        Side::Buy => {
            let avail = balances
                .available(&meta.counter)
                .ok_or_else(|| SizingError::UnknownAsset(meta.counter.clone()))?;
            Ok(avail * share / price)
        }
        Side::Sell => {
            let avail = balances
                .available(&meta.base)
                .ok_or_else(|| SizingError::UnknownAsset(meta.base.clone()))?;
            Ok(avail * share)
        }
    }
}

/// Gate sebelum submit: truncate ke volume scale (jangan pernah melebihi
/// saldo), clamp ke max_volume, lalu tolak kalau nol / di bawah min_volume.
pub fn finalize_volume(
    volume: Decimal,
    meta: &PairMeta,
    fallback_precision: u32,
) -> Result<Decimal, SizingError> {
    let scale = meta.volume_scale.unwrap_or(fallback_precision);
    let mut v = volume.round_dp_with_strategy(scale, RoundingStrategy::ToZero);
    if let Some(max) = meta.max_volume {
        v = v.min(max);
    }
    if v <= Decimal::ZERO {
        return Err(SizingError::ZeroSizeOrder);
    }
    if v < meta.min_volume {
        return Err(SizingError::BelowMinimum { volume: v, min: meta.min_volume });
    }
    Ok(v.normalize())
}
