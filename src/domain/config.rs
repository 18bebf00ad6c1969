//! Immutable engine configuration.
//!
//! Built once (from defaults or a [`ConfigPort`]), validated, then shared by
//! `Arc` with every component. Nothing mutates it after construction.

use chrono::{NaiveTime, TimeDelta};

use crate::domain::config_validation::validate_engine_config;
use crate::domain::error::TradingError;
use crate::ports::config_port::ConfigPort;

/// Indicator and entry-rule parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub fast_ema: usize,
    pub slow_ema: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_window: usize,
    pub volume_multiplier: f64,
    pub level_lookback: usize,
    /// Maximum distance from support/resistance, as a fraction of price.
    pub level_tolerance: f64,
    pub swing_lookback: usize,
    /// Widens the swing extreme used as stop reference, as a fraction of price.
    pub swing_buffer: f64,
    pub reward_risk_ratio: f64,
    pub allow_short: bool,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            fast_ema: 9,
            slow_ema: 15,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_window: 5,
            volume_multiplier: 1.2,
            level_lookback: 20,
            level_tolerance: 0.01,
            swing_lookback: 10,
            swing_buffer: 0.002,
            reward_risk_ratio: 2.0,
            allow_short: true,
        }
    }
}

/// Account-wide sizing and exposure limits.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub initial_capital: f64,
    pub risk_per_trade: f64,
    pub max_open_positions: usize,
    /// Fraction of current equity one trade may commit.
    pub max_capital_per_trade: f64,
    /// Fraction of session-start equity that halts new entries once lost.
    pub daily_loss_limit: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            initial_capital: 10_000.0,
            risk_per_trade: 0.02,
            max_open_positions: 1,
            max_capital_per_trade: 1.0,
            daily_loss_limit: 0.06,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionParams {
    /// Bars at or after this time of day force-close open trades and take no entries.
    pub close_time: Option<NaiveTime>,
}

impl SessionParams {
    pub fn is_closing(&self, time: NaiveTime) -> bool {
        self.close_time.is_some_and(|close| time >= close)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionParams {
    /// Further attempts after the first failed one.
    pub max_retries: u32,
    pub slippage_pct: f64,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        ExecutionParams {
            max_retries: 3,
            slippage_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceParams {
    pub sampling_interval_minutes: i64,
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
}

impl PerformanceParams {
    pub fn sampling_interval(&self) -> TimeDelta {
        TimeDelta::minutes(self.sampling_interval_minutes)
    }
}

impl Default for PerformanceParams {
    fn default() -> Self {
        PerformanceParams {
            sampling_interval_minutes: 24 * 60,
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub strategy: StrategyParams,
    pub risk: RiskParams,
    pub session: SessionParams,
    pub execution: ExecutionParams,
    pub performance: PerformanceParams,
}

impl EngineConfig {
    /// Reads every section from `port`, falling back to defaults for absent keys,
    /// and validates the result.
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, TradingError> {
        let d = EngineConfig::default();

        let strategy = StrategyParams {
            fast_ema: read_usize(port, "strategy", "fast_ema", d.strategy.fast_ema)?,
            slow_ema: read_usize(port, "strategy", "slow_ema", d.strategy.slow_ema)?,
            rsi_period: read_usize(port, "strategy", "rsi_period", d.strategy.rsi_period)?,
            rsi_overbought: port.get_double("strategy", "rsi_overbought", d.strategy.rsi_overbought)?,
            rsi_oversold: port.get_double("strategy", "rsi_oversold", d.strategy.rsi_oversold)?,
            macd_fast: read_usize(port, "strategy", "macd_fast", d.strategy.macd_fast)?,
            macd_slow: read_usize(port, "strategy", "macd_slow", d.strategy.macd_slow)?,
            macd_signal: read_usize(port, "strategy", "macd_signal", d.strategy.macd_signal)?,
            volume_window: read_usize(port, "strategy", "volume_window", d.strategy.volume_window)?,
            volume_multiplier: port.get_double(
                "strategy",
                "volume_multiplier",
                d.strategy.volume_multiplier,
            )?,
            level_lookback: read_usize(port, "strategy", "level_lookback", d.strategy.level_lookback)?,
            level_tolerance: port.get_double("strategy", "level_tolerance", d.strategy.level_tolerance)?,
            swing_lookback: read_usize(port, "strategy", "swing_lookback", d.strategy.swing_lookback)?,
            swing_buffer: port.get_double("strategy", "swing_buffer", d.strategy.swing_buffer)?,
            reward_risk_ratio: port.get_double(
                "strategy",
                "reward_risk_ratio",
                d.strategy.reward_risk_ratio,
            )?,
            allow_short: port.get_bool("strategy", "allow_short", d.strategy.allow_short)?,
        };

        let risk = RiskParams {
            initial_capital: port.get_double("risk", "initial_capital", d.risk.initial_capital)?,
            risk_per_trade: port.get_double("risk", "risk_per_trade", d.risk.risk_per_trade)?,
            max_open_positions: read_usize(
                port,
                "risk",
                "max_open_positions",
                d.risk.max_open_positions,
            )?,
            max_capital_per_trade: port.get_double(
                "risk",
                "max_capital_per_trade",
                d.risk.max_capital_per_trade,
            )?,
            daily_loss_limit: port.get_double("risk", "daily_loss_limit", d.risk.daily_loss_limit)?,
        };

        let session = SessionParams {
            close_time: read_time(port, "session", "close_time")?,
        };

        let max_retries = port.get_int("execution", "max_retries", d.execution.max_retries as i64)?;
        let execution = ExecutionParams {
            max_retries: u32::try_from(max_retries).map_err(|_| {
                TradingError::invalid("execution", "max_retries", "max_retries must be non-negative")
            })?,
            slippage_pct: port.get_double("execution", "slippage_pct", d.execution.slippage_pct)?,
        };

        let performance = PerformanceParams {
            sampling_interval_minutes: port.get_int(
                "performance",
                "sampling_interval_minutes",
                d.performance.sampling_interval_minutes,
            )?,
            periods_per_year: port.get_double(
                "performance",
                "periods_per_year",
                d.performance.periods_per_year,
            )?,
            risk_free_rate: port.get_double(
                "performance",
                "risk_free_rate",
                d.performance.risk_free_rate,
            )?,
        };

        let config = EngineConfig {
            strategy,
            risk,
            session,
            execution,
            performance,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        validate_engine_config(self)
    }
}

fn read_usize(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TradingError> {
    let value = port.get_int(section, key, default as i64)?;
    usize::try_from(value)
        .map_err(|_| TradingError::invalid(section, key, format!("{key} must be non-negative")))
}

fn read_time(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveTime>, TradingError> {
    match port.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Some)
            .map_err(|_| {
                TradingError::invalid(section, key, format!("invalid {key} format, expected HH:MM"))
            }),
    }
}
