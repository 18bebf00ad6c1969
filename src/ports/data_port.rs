//! Historical market data port trait.

use chrono::NaiveDate;

use crate::domain::error::TradingError;
use crate::domain::ohlcv::PriceBar;

pub trait MarketDataPort {
    /// Bars for `symbol` in ascending timestamp order, optionally limited to
    /// an inclusive date range.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, TradingError>;

    fn list_symbols(&self) -> Result<Vec<String>, TradingError>;
}
