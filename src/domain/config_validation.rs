//! Configuration validation.
//!
//! Checks every field of an [`EngineConfig`] before any component is built, so
//! construction either succeeds completely or fails with the offending key.

use crate::domain::config::{
    EngineConfig, ExecutionParams, PerformanceParams, RiskParams, StrategyParams,
};
use crate::domain::error::TradingError;

pub fn validate_engine_config(config: &EngineConfig) -> Result<(), TradingError> {
    validate_strategy(&config.strategy)?;
    validate_risk(&config.risk)?;
    validate_execution(&config.execution)?;
    validate_performance(&config.performance)?;
    Ok(())
}

pub fn validate_strategy(params: &StrategyParams) -> Result<(), TradingError> {
    validate_ema_periods(params)?;
    validate_rsi(params)?;
    validate_macd(params)?;
    validate_windows(params)?;
    validate_fraction(
        "strategy",
        "level_tolerance",
        params.level_tolerance,
        false,
    )?;
    if !(0.0..1.0).contains(&params.swing_buffer) {
        return Err(TradingError::invalid(
            "strategy",
            "swing_buffer",
            "swing_buffer must be between 0 and 1",
        ));
    }
    if !(params.volume_multiplier.is_finite() && params.volume_multiplier > 0.0) {
        return Err(TradingError::invalid(
            "strategy",
            "volume_multiplier",
            "volume_multiplier must be positive",
        ));
    }
    if !(params.reward_risk_ratio.is_finite() && params.reward_risk_ratio > 0.0) {
        return Err(TradingError::invalid(
            "strategy",
            "reward_risk_ratio",
            "reward_risk_ratio must be positive",
        ));
    }
    Ok(())
}

pub fn validate_risk(params: &RiskParams) -> Result<(), TradingError> {
    if !(params.initial_capital.is_finite() && params.initial_capital > 0.0) {
        return Err(TradingError::invalid(
            "risk",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    validate_fraction("risk", "risk_per_trade", params.risk_per_trade, false)?;
    validate_fraction(
        "risk",
        "max_capital_per_trade",
        params.max_capital_per_trade,
        false,
    )?;
    validate_fraction("risk", "daily_loss_limit", params.daily_loss_limit, false)?;
    if params.max_open_positions < 1 {
        return Err(TradingError::invalid(
            "risk",
            "max_open_positions",
            "max_open_positions must be at least 1",
        ));
    }
    Ok(())
}

fn validate_execution(params: &ExecutionParams) -> Result<(), TradingError> {
    if !(params.slippage_pct.is_finite() && params.slippage_pct >= 0.0) {
        return Err(TradingError::invalid(
            "execution",
            "slippage_pct",
            "slippage_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_performance(params: &PerformanceParams) -> Result<(), TradingError> {
    if params.sampling_interval_minutes < 1 {
        return Err(TradingError::invalid(
            "performance",
            "sampling_interval_minutes",
            "sampling_interval_minutes must be at least 1",
        ));
    }
    if !(params.periods_per_year.is_finite() && params.periods_per_year > 0.0) {
        return Err(TradingError::invalid(
            "performance",
            "periods_per_year",
            "periods_per_year must be positive",
        ));
    }
    validate_fraction("performance", "risk_free_rate", params.risk_free_rate, true)
}

fn validate_ema_periods(params: &StrategyParams) -> Result<(), TradingError> {
    if params.fast_ema < 1 {
        return Err(TradingError::invalid(
            "strategy",
            "fast_ema",
            "fast_ema must be at least 1",
        ));
    }
    if params.slow_ema <= params.fast_ema {
        return Err(TradingError::invalid(
            "strategy",
            "slow_ema",
            "slow_ema must be greater than fast_ema",
        ));
    }
    Ok(())
}

fn validate_rsi(params: &StrategyParams) -> Result<(), TradingError> {
    if params.rsi_period < 1 {
        return Err(TradingError::invalid(
            "strategy",
            "rsi_period",
            "rsi_period must be at least 1",
        ));
    }
    if !(0.0..=100.0).contains(&params.rsi_oversold) {
        return Err(TradingError::invalid(
            "strategy",
            "rsi_oversold",
            "rsi_oversold must be between 0 and 100",
        ));
    }
    if !(0.0..=100.0).contains(&params.rsi_overbought) {
        return Err(TradingError::invalid(
            "strategy",
            "rsi_overbought",
            "rsi_overbought must be between 0 and 100",
        ));
    }
    if params.rsi_oversold >= params.rsi_overbought {
        return Err(TradingError::invalid(
            "strategy",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }
    Ok(())
}

fn validate_macd(params: &StrategyParams) -> Result<(), TradingError> {
    if params.macd_fast < 1 {
        return Err(TradingError::invalid(
            "strategy",
            "macd_fast",
            "macd_fast must be at least 1",
        ));
    }
    if params.macd_slow <= params.macd_fast {
        return Err(TradingError::invalid(
            "strategy",
            "macd_slow",
            "macd_slow must be greater than macd_fast",
        ));
    }
    if params.macd_signal < 1 {
        return Err(TradingError::invalid(
            "strategy",
            "macd_signal",
            "macd_signal must be at least 1",
        ));
    }
    Ok(())
}

fn validate_windows(params: &StrategyParams) -> Result<(), TradingError> {
    for (key, value) in [
        ("volume_window", params.volume_window),
        ("level_lookback", params.level_lookback),
        ("swing_lookback", params.swing_lookback),
    ] {
        if value < 1 {
            return Err(TradingError::invalid(
                "strategy",
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }
    Ok(())
}

/// Accepts (0, 1], or [0, 1) when `allow_zero` is set.
fn validate_fraction(
    section: &str,
    key: &str,
    value: f64,
    allow_zero: bool,
) -> Result<(), TradingError> {
    let ok = if allow_zero {
        (0.0..1.0).contains(&value)
    } else {
        value > 0.0 && value <= 1.0
    };
    if ok {
        Ok(())
    } else {
        let range = if allow_zero { "[0, 1)" } else { "(0, 1]" };
        Err(TradingError::invalid(
            section,
            key,
            format!("{key} must be within {range}"),
        ))
    }
}
