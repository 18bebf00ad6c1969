//! Price bar representation and validation.

use chrono::NaiveDateTime;

use crate::domain::error::TradingError;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Checks the fields a bar must carry to be usable.
    ///
    /// The core never repairs a malformed bar; the caller must resend it.
    pub fn validate(&self) -> Result<(), TradingError> {
        let reason = if self.symbol.trim().is_empty() {
            Some("missing symbol")
        } else if ![self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
        {
            Some("missing or non-positive price field")
        } else if !self.volume.is_finite() || self.volume < 0.0 {
            Some("missing or negative volume")
        } else if self.high < self.low {
            Some("high below low")
        } else if self.open > self.high
            || self.open < self.low
            || self.close > self.high
            || self.close < self.low
        {
            Some("open/close outside high-low range")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(self.gap(reason)),
            None => Ok(()),
        }
    }

    /// Validates the bar and checks it follows `previous` strictly in time.
    pub fn validate_after(&self, previous: Option<&PriceBar>) -> Result<(), TradingError> {
        self.validate()?;
        if let Some(prev) = previous {
            if self.timestamp <= prev.timestamp {
                return Err(self.gap(&format!(
                    "timestamp not after previous bar at {}",
                    prev.timestamp
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn gap(&self, reason: &str) -> TradingError {
        TradingError::DataGap {
            symbol: self.symbol.clone(),
            timestamp: self.timestamp,
            reason: reason.to_string(),
        }
    }
}

/// Validates an ordered single-symbol sequence.
pub fn validate_sequence(bars: &[PriceBar]) -> Result<(), TradingError> {
    let mut previous: Option<&PriceBar> = None;
    for bar in bars {
        bar.validate_after(previous)?;
        previous = Some(bar);
    }
    Ok(())
}
