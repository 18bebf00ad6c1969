//! Drives bars through the per-symbol pipelines.
//!
//! The same [`Orchestrator::process_bar`] path serves backtests (a finite,
//! pre-loaded sequence) and live/paper trading (bars as they arrive).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::domain::config::EngineConfig;
use crate::domain::error::TradingError;
use crate::domain::events::EngineEvent;
use crate::domain::metrics::{EquityPoint, PerformanceAnalyzer, PerformanceSnapshot};
use crate::domain::ohlcv::PriceBar;
use crate::domain::pipeline::SymbolPipeline;
use crate::domain::risk::RiskManager;
use crate::domain::trade::{Side, Trade};
use crate::ports::execution_port::ExecutionPort;

/// Outcome of a backtest run. Trades still open at the end stay OPEN.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub performance: PerformanceSnapshot,
    pub events: Vec<EngineEvent>,
    pub bars_processed: usize,
    pub bars_rejected: usize,
}

/// A symbol whose venue position disagrees with the engine's OPEN trades.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionMismatch {
    pub symbol: String,
    pub engine_quantity: i64,
    pub broker_quantity: i64,
}

pub struct Orchestrator {
    config: Arc<EngineConfig>,
    risk: Arc<RiskManager>,
    executor: Box<dyn ExecutionPort + Send>,
    pipelines: BTreeMap<String, SymbolPipeline>,
    analyzer: PerformanceAnalyzer,
}

impl Orchestrator {
    /// Validates `config` and builds an orchestrator with its own risk ledger.
    pub fn new(
        config: EngineConfig,
        executor: Box<dyn ExecutionPort + Send>,
    ) -> Result<Self, TradingError> {
        config.validate()?;
        let risk = Arc::new(RiskManager::new(config.risk.clone()));
        Self::with_shared_risk(Arc::new(config), risk, executor)
    }

    /// Builds an orchestrator that shares capital and position caps with others.
    pub fn with_shared_risk(
        config: Arc<EngineConfig>,
        risk: Arc<RiskManager>,
        executor: Box<dyn ExecutionPort + Send>,
    ) -> Result<Self, TradingError> {
        config.validate()?;
        let analyzer =
            PerformanceAnalyzer::new(config.risk.initial_capital, config.performance.clone());
        Ok(Orchestrator {
            config,
            risk,
            executor,
            pipelines: BTreeMap::new(),
            analyzer,
        })
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub fn risk(&self) -> &Arc<RiskManager> {
        &self.risk
    }

    /// Processes one bar and returns the events it produced.
    pub fn process_bar(&mut self, bar: &PriceBar) -> Result<Vec<EngineEvent>, TradingError> {
        let mut events = Vec::new();
        let config = &self.config;
        let pipeline = self
            .pipelines
            .entry(bar.symbol.clone())
            .or_insert_with(|| SymbolPipeline::new(&bar.symbol, config));

        let closed = pipeline
            .on_bar(bar, config, &self.risk, self.executor.as_mut(), &mut events)
            .inspect_err(|err| warn!(error = %err, "bar rejected"))?;

        if let Some(trade) = closed {
            self.record_close(&trade);
        }
        Ok(events)
    }

    /// Feeds a CLOSED trade to the analyzer. The close is already booked by
    /// the lifecycle and the risk ledger, so a refusal here is logged rather
    /// than returned.
    fn record_close(&mut self, trade: &Trade) {
        if let Err(err) = self.analyzer.record(trade) {
            warn!(trade_id = %trade.id, error = %err, "close not recorded in analytics");
        }
    }

    /// Drains a pre-loaded multi-symbol sequence in timestamp order.
    ///
    /// Malformed or out-of-order bars are reported as `BarRejected` events and
    /// skipped; any other error aborts the run.
    pub fn run_backtest(&mut self, mut bars: Vec<PriceBar>) -> Result<BacktestReport, TradingError> {
        // Stable: bars sharing a timestamp keep their input order.
        bars.sort_by_key(|b| b.timestamp);

        let mut events = Vec::new();
        let mut bars_rejected = 0;
        for bar in &bars {
            match self.process_bar(bar) {
                Ok(mut produced) => events.append(&mut produced),
                Err(TradingError::DataGap {
                    symbol,
                    timestamp,
                    reason,
                }) => {
                    bars_rejected += 1;
                    events.push(EngineEvent::BarRejected {
                        symbol,
                        timestamp,
                        reason,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        let performance = self.performance();
        info!(
            bars = bars.len(),
            rejected = bars_rejected,
            trades = performance.total_trades,
            total_pnl = performance.total_pnl,
            "backtest complete"
        );
        Ok(BacktestReport {
            trades: self.trades(),
            equity_curve: self.analyzer.equity_curve().to_vec(),
            performance,
            events,
            bars_processed: bars.len() - bars_rejected,
            bars_rejected,
        })
    }

    /// Closes `symbol`'s OPEN trade with `FORCED_LIQUIDATION` at `price`.
    pub fn force_liquidate(
        &mut self,
        symbol: &str,
        price: f64,
        timestamp: NaiveDateTime,
    ) -> Result<Vec<EngineEvent>, TradingError> {
        let mut events = Vec::new();
        let Some(pipeline) = self.pipelines.get_mut(symbol) else {
            return Ok(events);
        };
        warn!(symbol, price, "forcing liquidation");
        let closed = pipeline.force_liquidate(
            price,
            timestamp,
            &self.risk,
            self.executor.as_mut(),
            &mut events,
        )?;
        if let Some(trade) = closed {
            self.record_close(&trade);
        }
        Ok(events)
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.analyzer.snapshot()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.analyzer.equity_curve()
    }

    /// Every trade across symbols, ordered by entry time then id.
    pub fn trades(&self) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .pipelines
            .values()
            .flat_map(|p| p.lifecycle().trades().iter().cloned())
            .collect();
        trades.sort_by(|a, b| a.entry_time.cmp(&b.entry_time).then_with(|| a.id.cmp(&b.id)));
        trades
    }

    pub fn open_trades(&self) -> Vec<&Trade> {
        self.pipelines
            .values()
            .filter_map(|p| p.lifecycle().open_trade())
            .collect()
    }

    /// Compares venue positions against OPEN trades.
    pub fn reconcile(&self) -> Result<Vec<PositionMismatch>, TradingError> {
        let broker = self
            .executor
            .fetch_positions()
            .map_err(|err| TradingError::OrderExecution {
                symbol: "*".into(),
                attempts: 1,
                reason: err.to_string(),
            })?;

        let mut engine: HashMap<String, i64> = HashMap::new();
        for trade in self.open_trades() {
            let signed = match trade.side {
                Side::Long => trade.quantity as i64,
                Side::Short => -(trade.quantity as i64),
            };
            *engine.entry(trade.symbol.clone()).or_default() += signed;
        }
        let mut venue: HashMap<String, i64> = HashMap::new();
        for position in broker {
            *venue.entry(position.symbol).or_default() += position.quantity;
        }

        let mut symbols: Vec<&String> = engine.keys().chain(venue.keys()).collect();
        symbols.sort();
        symbols.dedup();

        let mismatches: Vec<PositionMismatch> = symbols
            .into_iter()
            .filter_map(|symbol| {
                let engine_quantity = engine.get(symbol).copied().unwrap_or(0);
                let broker_quantity = venue.get(symbol).copied().unwrap_or(0);
                (engine_quantity != broker_quantity).then(|| PositionMismatch {
                    symbol: symbol.clone(),
                    engine_quantity,
                    broker_quantity,
                })
            })
            .collect();
        for m in &mismatches {
            warn!(
                symbol = %m.symbol,
                engine = m.engine_quantity,
                broker = m.broker_quantity,
                "position mismatch"
            );
        }
        Ok(mismatches)
    }

    /// Number of trades per status, for reporting.
    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for p in self.pipelines.values() {
            for t in p.lifecycle().trades() {
                *counts.entry(t.status.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}
