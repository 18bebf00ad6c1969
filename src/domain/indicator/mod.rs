//! Technical indicators for the crossover strategy.
//!
//! Each indicator exists twice: a streaming state struct fed one bar at a time,
//! and a column-wise batch function over a full series. Both perform the same
//! floating-point operations in the same order, so over an identical bar prefix
//! they produce identical values.
//!
//! - `IndicatorSnapshot`: every indicator value for one bar
//! - `IndicatorEngine`: per-symbol streaming state producing snapshots

pub mod ema;
pub mod macd;
pub mod rolling;
pub mod rsi;

use chrono::NaiveDateTime;

use crate::domain::config::StrategyParams;
use crate::domain::error::TradingError;
use crate::domain::ohlcv::{validate_sequence, PriceBar};

use self::ema::{ema_series, Ema};
use self::macd::{macd_series, Macd};
use self::rolling::{rolling_extremes_series, trailing_mean_series, RollingExtremes, TrailingMean};
use self::rsi::{rsi_series, Rsi};

/// Indicator values as of one bar. `None` marks an indicator still warming up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub fast_ema: Option<f64>,
    pub slow_ema: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    /// Mean volume of the bars preceding this one.
    pub volume_avg: Option<f64>,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub swing_low: Option<f64>,
    pub swing_high: Option<f64>,
}

impl IndicatorSnapshot {
    /// Both EMAs, once seeded.
    pub fn emas(&self) -> Option<(f64, f64)> {
        Some((self.fast_ema?, self.slow_ema?))
    }
}

/// Streaming indicator state for one symbol.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    fast: Ema,
    slow: Ema,
    rsi: Rsi,
    macd: Macd,
    volume: TrailingMean,
    levels: RollingExtremes,
    swings: RollingExtremes,
}

impl IndicatorEngine {
    pub fn new(params: &StrategyParams) -> Self {
        IndicatorEngine {
            fast: Ema::new(params.fast_ema),
            slow: Ema::new(params.slow_ema),
            rsi: Rsi::new(params.rsi_period),
            macd: Macd::new(params.macd_fast, params.macd_slow, params.macd_signal),
            volume: TrailingMean::new(params.volume_window),
            levels: RollingExtremes::new(params.level_lookback),
            swings: RollingExtremes::new(params.swing_lookback),
        }
    }

    /// Advances every indicator by one bar. The caller guarantees ordering.
    pub fn update(&mut self, bar: &PriceBar) -> IndicatorSnapshot {
        let macd = self.macd.update(bar.close);
        let levels = self.levels.update(bar.low, bar.high);
        let swings = self.swings.update(bar.low, bar.high);

        IndicatorSnapshot {
            timestamp: bar.timestamp,
            fast_ema: self.fast.update(bar.close),
            slow_ema: self.slow.update(bar.close),
            rsi: self.rsi.update(bar.close),
            macd: macd.map(|m| m.line),
            macd_signal: macd.and_then(|m| m.signal),
            macd_histogram: macd.and_then(|m| m.histogram()),
            volume_avg: self.volume.update(bar.volume),
            support: levels.map(|(low, _)| low),
            resistance: levels.map(|(_, high)| high),
            swing_low: swings.map(|(low, _)| low),
            swing_high: swings.map(|(_, high)| high),
        }
    }

    /// Recomputes snapshots for a whole single-symbol sequence, column by column.
    pub fn batch(
        params: &StrategyParams,
        bars: &[PriceBar],
    ) -> Result<Vec<IndicatorSnapshot>, TradingError> {
        validate_sequence(bars)?;

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let fast = ema_series(&closes, params.fast_ema);
        let slow = ema_series(&closes, params.slow_ema);
        let rsi = rsi_series(&closes, params.rsi_period);
        let macd = macd_series(&closes, params.macd_fast, params.macd_slow, params.macd_signal);
        let volume = trailing_mean_series(&volumes, params.volume_window);
        let levels = rolling_extremes_series(&lows, &highs, params.level_lookback);
        let swings = rolling_extremes_series(&lows, &highs, params.swing_lookback);

        Ok(bars
            .iter()
            .enumerate()
            .map(|(i, bar)| IndicatorSnapshot {
                timestamp: bar.timestamp,
                fast_ema: fast[i],
                slow_ema: slow[i],
                rsi: rsi[i],
                macd: macd[i].map(|m| m.line),
                macd_signal: macd[i].and_then(|m| m.signal),
                macd_histogram: macd[i].and_then(|m| m.histogram()),
                volume_avg: volume[i],
                support: levels[i].map(|(low, _)| low),
                resistance: levels[i].map(|(_, high)| high),
                swing_low: swings[i].map(|(low, _)| low),
                swing_high: swings[i].map(|(_, high)| high),
            })
            .collect())
    }
}
