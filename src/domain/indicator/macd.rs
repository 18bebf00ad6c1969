//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow), defined once both EMAs are seeded
//! Signal Line = EMA(signal) of MACD Line, seeded with the SMA of its first values
//! Histogram = MACD Line - Signal Line
//!
//! Warmup: slow - 1 bars for the line, slow - 1 + signal - 1 for the signal.

use crate::domain::indicator::ema::{ema_series, Ema};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: Option<f64>,
}

impl MacdValue {
    pub fn histogram(&self) -> Option<f64> {
        self.signal.map(|s| self.line - s)
    }
}

/// Streaming MACD state.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Macd {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let line = fast? - slow?;
        let signal = self.signal.update(line);
        Some(MacdValue { line, signal })
    }
}

/// Batch MACD over a full close column.
pub fn macd_series(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<Option<MacdValue>> {
    let ema_fast = ema_series(closes, fast);
    let ema_slow = ema_series(closes, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // The signal EMA runs over the defined part of the line only.
    let defined: Vec<f64> = line.iter().flatten().copied().collect();
    let mut signal = ema_series(&defined, signal_period).into_iter();

    line.into_iter()
        .map(|l| {
            l.map(|line| MacdValue {
                line,
                signal: signal.next().flatten(),
            })
        })
        .collect()
}
