//! Per-symbol bar pipeline: indicators, exit check, entry check.

use tracing::{debug, warn};

use crate::domain::config::EngineConfig;
use crate::domain::error::TradingError;
use crate::domain::events::EngineEvent;
use crate::domain::indicator::{IndicatorEngine, IndicatorSnapshot};
use crate::domain::lifecycle::TradeLifecycleManager;
use crate::domain::ohlcv::PriceBar;
use crate::domain::risk::RiskManager;
use crate::domain::signal::{evaluate_entry, evaluate_exit};
use crate::domain::trade::{ExitReason, Trade};
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug)]
pub struct SymbolPipeline {
    engine: IndicatorEngine,
    lifecycle: TradeLifecycleManager,
    prev: Option<IndicatorSnapshot>,
    last_bar: Option<PriceBar>,
}

impl SymbolPipeline {
    pub fn new(symbol: &str, config: &EngineConfig) -> Self {
        SymbolPipeline {
            engine: IndicatorEngine::new(&config.strategy),
            lifecycle: TradeLifecycleManager::new(symbol, config.execution.max_retries),
            prev: None,
            last_bar: None,
        }
    }

    pub fn lifecycle(&self) -> &TradeLifecycleManager {
        &self.lifecycle
    }

    pub fn last_snapshot(&self) -> Option<&IndicatorSnapshot> {
        self.prev.as_ref()
    }

    /// Runs one bar through the pipeline and returns the trade it closed, if any.
    ///
    /// A resend of the last processed bar is ignored; an earlier or malformed
    /// bar is a `DataGap` and leaves all state untouched.
    pub fn on_bar(
        &mut self,
        bar: &PriceBar,
        config: &EngineConfig,
        risk: &RiskManager,
        executor: &mut dyn ExecutionPort,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Option<Trade>, TradingError> {
        if let Some(last) = &self.last_bar {
            if last.timestamp == bar.timestamp {
                debug!(symbol = %bar.symbol, timestamp = %bar.timestamp, "bar already processed");
                return Ok(None);
            }
        }
        bar.validate_after(self.last_bar.as_ref())?;

        risk.roll_session(bar.timestamp.date());
        let snapshot = self.engine.update(bar);
        debug!(
            symbol = %bar.symbol,
            timestamp = %bar.timestamp,
            close = bar.close,
            fast_ema = ?snapshot.fast_ema,
            slow_ema = ?snapshot.slow_ema,
            rsi = ?snapshot.rsi,
            "indicators updated"
        );

        let mut closed = None;
        if let Some(prev) = self.prev {
            if let Some(trade) = self.lifecycle.open_trade() {
                if let Some(exit) = evaluate_exit(config, trade, &prev, &snapshot, bar) {
                    let reason = exit.exit_reason.unwrap_or(ExitReason::OppositeSignal);
                    events.push(EngineEvent::Signal(exit.clone()));
                    closed = self
                        .lifecycle
                        .close(exit.timestamp, exit.price, reason, risk, executor, events)?;
                }
            }

            if self.lifecycle.active().is_none() {
                if let Some(entry) = evaluate_entry(config, &prev, &snapshot, bar) {
                    events.push(EngineEvent::Signal(entry.clone()));
                    // A close may already be booked on this bar; an entry
                    // failure must not unwind it.
                    let entered = risk
                        .plan(&entry, &config.strategy)
                        .and_then(|plan| self.lifecycle.enter(&entry, plan, risk, executor, events));
                    if let Err(err) = entered {
                        warn!(symbol = %bar.symbol, error = %err, "entry signal not taken");
                        events.push(EngineEvent::Rejected {
                            symbol: bar.symbol.clone(),
                            timestamp: bar.timestamp,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        self.prev = Some(snapshot);
        self.last_bar = Some(bar.clone());
        Ok(closed)
    }

    /// Closes the OPEN trade, if any, with `FORCED_LIQUIDATION` at `price`.
    pub fn force_liquidate(
        &mut self,
        price: f64,
        timestamp: chrono::NaiveDateTime,
        risk: &RiskManager,
        executor: &mut dyn ExecutionPort,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Option<Trade>, TradingError> {
        self.lifecycle.close(
            timestamp,
            price,
            ExitReason::ForcedLiquidation,
            risk,
            executor,
            events,
        )
    }
}
