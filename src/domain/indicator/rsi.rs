//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are invalid (need n price changes to compute initial average).

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

fn split_change(change: f64) -> (f64, f64) {
    let gain = if change > 0.0 { change } else { 0.0 };
    let loss = if change < 0.0 { -change } else { 0.0 };
    (gain, loss)
}

/// Streaming RSI state.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    changes: usize,
    avg_gain: f64,
    avg_loss: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Rsi {
            period,
            prev_close: None,
            changes: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        let prev = self.prev_close.replace(close)?;
        let (gain, loss) = split_change(close - prev);
        let n = self.period as f64;
        self.changes += 1;

        if self.changes < self.period {
            // avg_* hold running sums until the seed bar.
            self.avg_gain += gain;
            self.avg_loss += loss;
            None
        } else if self.changes == self.period {
            self.avg_gain = (self.avg_gain + gain) / n;
            self.avg_loss = (self.avg_loss + loss) / n;
            Some(rsi_from_averages(self.avg_gain, self.avg_loss))
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
            Some(rsi_from_averages(self.avg_gain, self.avg_loss))
        }
    }
}

/// Batch RSI over a full close column.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || closes.len() < 2 {
        return vec![None; closes.len()];
    }

    let mut values = Vec::with_capacity(closes.len());
    values.push(None);

    let mut gains: Vec<f64> = Vec::with_capacity(closes.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(closes.len() - 1);
    for i in 1..closes.len() {
        let (gain, loss) = split_change(closes[i] - closes[i - 1]);
        gains.push(gain);
        losses.push(loss);
    }

    let n = period as f64;
    let mut sum_gain = 0.0;
    let mut sum_loss = 0.0;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for idx in 0..gains.len() {
        if idx < period - 1 {
            sum_gain += gains[idx];
            sum_loss += losses[idx];
            values.push(None);
        } else if idx == period - 1 {
            avg_gain = (sum_gain + gains[idx]) / n;
            avg_loss = (sum_loss + losses[idx]) / n;
            values.push(Some(rsi_from_averages(avg_gain, avg_loss)));
        } else {
            avg_gain = (avg_gain * (n - 1.0) + gains[idx]) / n;
            avg_loss = (avg_loss * (n - 1.0) + losses[idx]) / n;
            values.push(Some(rsi_from_averages(avg_gain, avg_loss)));
        }
    }

    values
}
