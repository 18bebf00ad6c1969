#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use crosstrader::domain::config::{EngineConfig, RiskParams, StrategyParams};
pub use crosstrader::domain::ohlcv::PriceBar;
use crosstrader::ports::execution_port::{
    BrokerPosition, ExecutionError, ExecutionPort, Fill, OrderAction, OrderId, OrderRequest,
};

pub fn ts(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(symbol: &str, timestamp: NaiveDateTime, close: f64, volume: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        timestamp,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume,
    }
}

pub fn make_ohlc(
    symbol: &str,
    timestamp: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        timestamp,
        open,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

/// Small periods so a crossover entry happens on the fifth bar.
pub fn scenario_config() -> EngineConfig {
    EngineConfig {
        strategy: StrategyParams {
            fast_ema: 2,
            slow_ema: 3,
            rsi_period: 2,
            rsi_overbought: 80.0,
            rsi_oversold: 20.0,
            macd_fast: 2,
            macd_slow: 3,
            macd_signal: 2,
            volume_window: 2,
            volume_multiplier: 1.2,
            level_lookback: 4,
            level_tolerance: 0.1,
            swing_lookback: 4,
            swing_buffer: 0.0,
            reward_risk_ratio: 2.0,
            allow_short: false,
        },
        risk: RiskParams {
            initial_capital: 10_000.0,
            risk_per_trade: 0.02,
            max_open_positions: 1,
            max_capital_per_trade: 1.0,
            daily_loss_limit: 0.06,
        },
        ..EngineConfig::default()
    }
}

/// Closes 100, 98, 96, 94, 99 five minutes apart from `start`; the last bar
/// crosses the fast EMA above the slow one on rising volume.
///
/// The long entry lands at 99 with stop 93 and target 111.
pub fn crossover_bars(symbol: &str, start: NaiveDateTime) -> Vec<PriceBar> {
    let closes = [100.0, 98.0, 96.0, 94.0, 99.0];
    let volumes = [1000.0, 1000.0, 1000.0, 1000.0, 1300.0];
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, volume))| {
            make_bar(symbol, start + TimeDelta::minutes(5 * i as i64), close, volume)
        })
        .collect()
}

pub fn after(bars: &[PriceBar], minutes: i64) -> NaiveDateTime {
    bars.last().unwrap().timestamp + TimeDelta::minutes(minutes)
}

#[derive(Debug, Default)]
pub struct ExecutionLog {
    pub submitted: Vec<OrderRequest>,
    pub cancelled: Vec<OrderId>,
    /// Outcomes for upcoming confirms; `Ok` when exhausted.
    pub confirm_script: VecDeque<Result<(), ExecutionError>>,
    /// Quantity and price for upcoming fills; the full order at its
    /// reference price when exhausted.
    pub fill_script: VecDeque<(u64, f64)>,
    pub always_fail: bool,
    pub positions: BTreeMap<String, i64>,
    pub position_override: Option<Vec<BrokerPosition>>,
    pub fetch_error: Option<ExecutionError>,
    next_id: u64,
    working: BTreeMap<String, OrderRequest>,
}

/// Scripted execution collaborator. Clones share one log so a test can
/// inspect it after handing the executor to an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    pub log: Arc<Mutex<ExecutionLog>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let exec = Self::default();
        exec.log.lock().unwrap().always_fail = true;
        exec
    }

    pub fn with_script(script: Vec<Result<(), ExecutionError>>) -> Self {
        let exec = Self::default();
        exec.log.lock().unwrap().confirm_script = script.into();
        exec
    }

    pub fn script_fill(&self, quantity: u64, price: f64) {
        self.log.lock().unwrap().fill_script.push_back((quantity, price));
    }

    pub fn set_always_fail(&self, fail: bool) {
        self.log.lock().unwrap().always_fail = fail;
    }

    pub fn set_positions(&self, positions: Vec<BrokerPosition>) {
        self.log.lock().unwrap().position_override = Some(positions);
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.log.lock().unwrap().submitted.clone()
    }

    pub fn cancelled_count(&self) -> usize {
        self.log.lock().unwrap().cancelled.len()
    }
}

impl ExecutionPort for MockExecutor {
    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderId, ExecutionError> {
        let mut log = self.log.lock().unwrap();
        log.next_id += 1;
        let id = format!("mock-{}", log.next_id);
        log.submitted.push(order.clone());
        log.working.insert(id.clone(), order.clone());
        Ok(OrderId(id))
    }

    fn confirm_fill(&mut self, order_id: &OrderId) -> Result<Fill, ExecutionError> {
        let mut log = self.log.lock().unwrap();
        if log.always_fail {
            return Err(ExecutionError::Unavailable("scripted outage".into()));
        }
        if let Some(Err(err)) = log.confirm_script.pop_front() {
            return Err(err);
        }
        let order = log
            .working
            .remove(&order_id.0)
            .ok_or_else(|| ExecutionError::Unconfirmed(order_id.0.clone()))?;
        let (quantity, price) = log
            .fill_script
            .pop_front()
            .unwrap_or((order.quantity, order.reference_price));
        let delta = match order.action {
            OrderAction::Buy => quantity as i64,
            OrderAction::Sell => -(quantity as i64),
        };
        *log.positions.entry(order.symbol.clone()).or_default() += delta;
        Ok(Fill {
            order_id: order_id.clone(),
            price,
            quantity,
        })
    }

    fn cancel_order(&mut self, order_id: &OrderId) -> Result<(), ExecutionError> {
        let mut log = self.log.lock().unwrap();
        log.working.remove(&order_id.0);
        log.cancelled.push(order_id.clone());
        Ok(())
    }

    fn fetch_positions(&self) -> Result<Vec<BrokerPosition>, ExecutionError> {
        let log = self.log.lock().unwrap();
        if let Some(err) = &log.fetch_error {
            return Err(err.clone());
        }
        if let Some(positions) = &log.position_override {
            return Ok(positions.clone());
        }
        Ok(log
            .positions
            .iter()
            .filter(|(_, q)| **q != 0)
            .map(|(symbol, &quantity)| BrokerPosition {
                symbol: symbol.clone(),
                quantity,
            })
            .collect())
    }
}
