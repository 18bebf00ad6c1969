//! Domain error types.

use chrono::NaiveDateTime;

use crate::domain::trade::TradeStatus;

/// Top-level error type for crosstrader.
#[derive(Debug, thiserror::Error)]
pub enum TradingError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("insufficient capital for {symbol}: {reason}")]
    InsufficientCapital { symbol: String, reason: String },

    #[error("invalid trade parameters: {reason}")]
    InvalidTrade { reason: String },

    #[error("order execution failed for {symbol} after {attempts} attempt(s): {reason}")]
    OrderExecution {
        symbol: String,
        attempts: u32,
        reason: String,
    },

    #[error("data gap for {symbol} at {timestamp}: {reason}")]
    DataGap {
        symbol: String,
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("invalid transition for trade {trade_id}: {from} -> {to}")]
    InvalidTransition {
        trade_id: String,
        from: TradeStatus,
        to: TradeStatus,
    },

    #[error("out-of-order close for trade {trade_id}: {reason}")]
    OutOfOrder { trade_id: String, reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradingError {
    /// Configuration errors are fatal at construction time.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TradingError::ConfigParse { .. }
                | TradingError::ConfigMissing { .. }
                | TradingError::ConfigInvalid { .. }
        )
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TradingError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TradingError> for std::process::ExitCode {
    fn from(err: &TradingError) -> Self {
        let code: u8 = match err {
            TradingError::Io(_) => 1,
            TradingError::ConfigParse { .. }
            | TradingError::ConfigMissing { .. }
            | TradingError::ConfigInvalid { .. } => 2,
            TradingError::Data { .. } | TradingError::DataGap { .. } => 3,
            TradingError::OrderExecution { .. } => 4,
            TradingError::InsufficientCapital { .. }
            | TradingError::InvalidTrade { .. }
            | TradingError::InvalidTransition { .. }
            | TradingError::OutOfOrder { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_flagged() {
        let err = TradingError::invalid("risk", "risk_per_trade", "must be positive");
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "invalid config value [risk] risk_per_trade: must be positive"
        );
    }

    #[test]
    fn data_gap_is_not_configuration() {
        let err = TradingError::DataGap {
            symbol: "SBIN".into(),
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
            reason: "out of order".into(),
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("SBIN"));
    }
}
