//! Rolling-window statistics: trailing volume mean and price extremes.

use std::collections::VecDeque;

/// Mean of the `window` values preceding the current one.
#[derive(Debug, Clone)]
pub struct TrailingMean {
    window: usize,
    buf: VecDeque<f64>,
}

impl TrailingMean {
    pub fn new(window: usize) -> Self {
        TrailingMean {
            window,
            buf: VecDeque::with_capacity(window + 1),
        }
    }

    /// Returns the mean of the previous window, then admits `x`.
    pub fn update(&mut self, x: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }
        let mean = if self.buf.len() == self.window {
            Some(self.buf.iter().sum::<f64>() / self.window as f64)
        } else {
            None
        };
        self.buf.push_back(x);
        if self.buf.len() > self.window {
            self.buf.pop_front();
        }
        mean
    }
}

pub fn trailing_mean_series(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i < window {
                None
            } else {
                Some(values[i - window..i].iter().sum::<f64>() / window as f64)
            }
        })
        .collect()
}

/// Lowest low and highest high over the last `window` bars, current bar included.
#[derive(Debug, Clone)]
pub struct RollingExtremes {
    window: usize,
    lows: VecDeque<f64>,
    highs: VecDeque<f64>,
}

impl RollingExtremes {
    pub fn new(window: usize) -> Self {
        RollingExtremes {
            window,
            lows: VecDeque::with_capacity(window),
            highs: VecDeque::with_capacity(window),
        }
    }

    /// Returns `(lowest_low, highest_high)` once the window is full.
    pub fn update(&mut self, low: f64, high: f64) -> Option<(f64, f64)> {
        if self.window == 0 {
            return None;
        }
        self.lows.push_back(low);
        self.highs.push_back(high);
        if self.lows.len() > self.window {
            self.lows.pop_front();
            self.highs.pop_front();
        }
        if self.lows.len() < self.window {
            return None;
        }
        Some((min_of(self.lows.iter()), max_of(self.highs.iter())))
    }
}

pub fn rolling_extremes_series(
    lows: &[f64],
    highs: &[f64],
    window: usize,
) -> Vec<Option<(f64, f64)>> {
    (0..lows.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                None
            } else {
                let start = i + 1 - window;
                Some((
                    min_of(lows[start..=i].iter()),
                    max_of(highs[start..=i].iter()),
                ))
            }
        })
        .collect()
}

fn min_of<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.fold(f64::INFINITY, |acc, &v| acc.min(v))
}

fn max_of<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
}
