//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

/// Streaming EMA state.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seen: usize,
    sum: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Ema {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seen: 0,
            sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        match self.value {
            None => {
                self.sum += x;
                self.seen += 1;
                if self.seen == self.period {
                    self.value = Some(self.sum / self.period as f64);
                }
            }
            Some(ema) => {
                self.value = Some(x * self.k + ema * (1.0 - self.k));
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Batch EMA over a full value column.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &v) in values.iter().enumerate() {
        if i < period - 1 {
            sum += v;
            out.push(None);
        } else if i == period - 1 {
            sum += v;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = v * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_warmup() {
        let series = ema_series(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);
        assert!(series[0].is_none());
        assert!(series[1].is_none());
        assert!(series[2..].iter().all(Option::is_some));
    }

    #[test]
    fn ema_period_1_tracks_input() {
        let series = ema_series(&[10.0, 20.0, 30.0], 1);
        assert_eq!(series, vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn ema_seed_is_sma() {
        let series = ema_series(&[10.0, 20.0, 30.0], 3);
        let expected_sma = (10.0 + 20.0 + 30.0) / 3.0;
        assert!((series[2].unwrap() - expected_sma).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_recursive_calculation() {
        let series = ema_series(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        let k = 2.0 / 4.0;
        let sma = (10.0 + 20.0 + 30.0) / 3.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert!((series[3].unwrap() - ema_3).abs() < f64::EPSILON);
        assert!((series[4].unwrap() - ema_4).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_equal_prices() {
        let series = ema_series(&[100.0; 5], 3);
        for v in series.iter().skip(2) {
            assert!((v.unwrap() - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_empty_and_zero_period() {
        assert!(ema_series(&[], 3).is_empty());
        assert_eq!(ema_series(&[10.0, 20.0], 0), vec![None, None]);
    }

    #[test]
    fn streaming_matches_batch() {
        let values = [10.0, 12.5, 11.0, 13.25, 15.0, 14.0, 16.5];
        let batch = ema_series(&values, 4);
        let mut ema = Ema::new(4);
        let streamed: Vec<Option<f64>> = values.iter().map(|&v| ema.update(v)).collect();
        assert_eq!(streamed, batch);
        assert_eq!(ema.value(), *batch.last().unwrap());
    }

    #[test]
    fn streaming_zero_period_never_ready() {
        let mut ema = Ema::new(0);
        assert_eq!(ema.update(10.0), None);
        assert_eq!(ema.value(), None);
    }
}
