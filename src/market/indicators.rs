//! Pure indicator math over ordered price/volume series (oldest -> newest).
//!
//! Every function signals `InsufficientDataError` instead of panicking when
//! the series is shorter than its window; callers degrade to NEUTRAL.

use crate::core::InsufficientDataError;

fn require(available: usize, required: usize) -> Result<(), InsufficientDataError> {
    if available < required {
        Err(InsufficientDataError {
            required,
            available,
        })
    } else {
        Ok(())
    }
}

pub fn sma(prices: &[f64], period: usize) -> Result<f64, InsufficientDataError> {
    require(prices.len(), period)?;
    let sum: f64 = prices.iter().rev().take(period).sum();
    Ok(sum / period as f64)
}

/// Exponential moving average, seeded by the first price,
/// smoothing factor 2 / (period + 1).
pub fn ema(prices: &[f64], period: usize) -> Result<f64, InsufficientDataError> {
    require(prices.len(), period)?;

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = prices[0];
    for price in prices.iter().skip(1) {
        ema = (price - ema) * multiplier + ema;
    }
    Ok(ema)
}

/// Relative strength index over the trailing `period` changes.
/// An average loss of zero maps to RSI 100.
pub fn rsi(prices: &[f64], period: usize) -> Result<f64, InsufficientDataError> {
    require(prices.len(), period + 1)?;

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in (prices.len() - period)..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += -change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}

/// Volume-weighted average price from typical prices (H+L+C)/3.
/// Zero cumulative volume falls back to the latest close.
pub fn vwap(
    closes: &[f64],
    highs: &[f64],
    lows: &[f64],
    volumes: &[f64],
) -> Result<f64, InsufficientDataError> {
    let available = closes.len().min(highs.len()).min(lows.len()).min(volumes.len());
    require(available, 1)?;

    let mut pv_sum = 0.0;
    let mut vol_sum = 0.0;
    for i in 0..available {
        let typical = (highs[i] + lows[i] + closes[i]) / 3.0;
        pv_sum += typical * volumes[i];
        vol_sum += volumes[i];
    }

    if vol_sum == 0.0 {
        return Ok(closes[available - 1]);
    }
    Ok(pv_sum / vol_sum)
}

/// Bollinger bands: SMA over `window` plus/minus `k` standard deviations.
/// Returns (upper, middle, lower).
pub fn bollinger(
    prices: &[f64],
    window: usize,
    k: f64,
) -> Result<(f64, f64, f64), InsufficientDataError> {
    let mid = sma(prices, window)?;

    let variance: f64 = prices
        .iter()
        .rev()
        .take(window)
        .map(|p| (p - mid).powi(2))
        .sum::<f64>()
        / window as f64;
    let std = variance.sqrt();

    Ok((mid + k * std, mid, mid - k * std))
}

/// Latest volume relative to the trailing average over `period` bars.
pub fn volume_ratio(volumes: &[f64], period: usize) -> Result<f64, InsufficientDataError> {
    require(volumes.len(), period)?;

    let trailing_avg: f64 = volumes.iter().rev().take(period).sum::<f64>() / period as f64;
    if trailing_avg == 0.0 {
        return Ok(0.0);
    }
    Ok(volumes[volumes.len() - 1] / trailing_avg)
}
