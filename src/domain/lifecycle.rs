//! Trade lifecycle state machine for one symbol.
//!
//! PENDING -> OPEN on a confirmed entry fill, OPEN -> CLOSED on a confirmed
//! exit fill, PENDING -> CANCELLED when risk caps refuse the entry or the
//! entry order cannot be executed. Every transition is published as a
//! [`TradeEvent`](crate::domain::events::TradeEvent). Terminal trades are kept
//! for analytics.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::domain::error::TradingError;
use crate::domain::events::{EngineEvent, SignalEvent};
use crate::domain::risk::{RiskManager, TradePlan};
use crate::domain::trade::{ExitReason, Side, Trade, TradeStatus};
use crate::ports::execution_port::{ExecutionPort, Fill, OrderAction, OrderRequest};

#[derive(Debug)]
pub struct TradeLifecycleManager {
    symbol: String,
    max_retries: u32,
    trades: Vec<Trade>,
    active: Option<usize>,
    next_seq: u64,
}

impl TradeLifecycleManager {
    pub fn new(symbol: impl Into<String>, max_retries: u32) -> Self {
        TradeLifecycleManager {
            symbol: symbol.into(),
            max_retries,
            trades: Vec::new(),
            active: None,
            next_seq: 1,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Every trade ever created for this symbol, terminal ones included.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// The PENDING or OPEN trade, if any.
    pub fn active(&self) -> Option<&Trade> {
        self.active.map(|i| &self.trades[i])
    }

    pub fn open_trade(&self) -> Option<&Trade> {
        self.active().filter(|t| t.status == TradeStatus::Open)
    }

    /// Creates a PENDING trade from an accepted ENTRY signal, reserves risk
    /// capacity and executes the entry order.
    ///
    /// Cap refusals and execution failures cancel the trade and are reported
    /// through `events`; only invariant violations return an error.
    pub fn enter(
        &mut self,
        signal: &SignalEvent,
        plan: TradePlan,
        risk: &RiskManager,
        executor: &mut dyn ExecutionPort,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), TradingError> {
        if let Some(active) = self.active() {
            return Err(TradingError::InvalidTrade {
                reason: format!("{} already has active trade {}", self.symbol, active.id),
            });
        }

        let id = format!("{}-{}", self.symbol, self.next_seq);
        let trade = Trade::pending(
            id,
            self.symbol.clone(),
            signal.side,
            signal.timestamp,
            signal.price,
            plan.quantity,
            plan.stop_loss,
            plan.target,
        )?;
        self.next_seq += 1;
        self.trades.push(trade);
        let idx = self.trades.len() - 1;
        self.active = Some(idx);
        events.push(EngineEvent::transition(None, &self.trades[idx]));

        match risk.reserve(&self.symbol, plan.quantity, signal.price) {
            Ok(quantity) => self.trades[idx].quantity = quantity,
            Err(err) => {
                warn!(symbol = %self.symbol, error = %err, "entry refused by risk caps");
                self.cancel_active(events)?;
                events.push(EngineEvent::Rejected {
                    symbol: self.symbol.clone(),
                    timestamp: signal.timestamp,
                    reason: err.to_string(),
                });
                return Ok(());
            }
        }

        let order = self.order_for(idx, entry_action(signal.side), signal.price, signal.timestamp);
        let filled = match self.execute(executor, &order) {
            Ok(fill) if fill.quantity == 0 => {
                if let Err(err) = executor.cancel_order(&fill.order_id) {
                    warn!(trade_id = %order.trade_id, error = %err, "cancel failed");
                }
                Err(TradingError::OrderExecution {
                    symbol: self.symbol.clone(),
                    attempts: 1,
                    reason: format!("order {} filled zero quantity", fill.order_id.0),
                })
            }
            other => other,
        };
        match filled {
            Ok(fill) => {
                risk.confirm_fill(&self.symbol, fill.quantity, fill.price);
                let trade = &mut self.trades[idx];
                trade.quantity = fill.quantity;
                trade.open(fill.price)?;
                info!(
                    trade_id = %trade.id,
                    side = %trade.side,
                    quantity = trade.quantity,
                    entry = trade.entry_price,
                    stop = trade.stop_loss,
                    target = trade.target,
                    "trade opened"
                );
                events.push(EngineEvent::transition(Some(TradeStatus::Pending), trade));
            }
            Err(err) => {
                risk.cancel(&self.symbol);
                let trade_id = self.trades[idx].id.clone();
                self.cancel_active(events)?;
                events.push(EngineEvent::Degraded {
                    symbol: self.symbol.clone(),
                    trade_id,
                    timestamp: signal.timestamp,
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Closes the OPEN trade at `price`. Returns the CLOSED trade, or `None`
    /// when there is no open trade or execution failed (the trade then stays
    /// OPEN and a `Degraded` event is emitted).
    pub fn close(
        &mut self,
        timestamp: NaiveDateTime,
        price: f64,
        reason: ExitReason,
        risk: &RiskManager,
        executor: &mut dyn ExecutionPort,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Option<Trade>, TradingError> {
        let Some(idx) = self
            .active
            .filter(|&i| self.trades[i].status == TradeStatus::Open)
        else {
            return Ok(None);
        };

        let side = self.trades[idx].side;
        let order = self.order_for(idx, entry_action(side.opposite()), price, timestamp);
        let fill = match self.execute(executor, &order) {
            Ok(fill) => fill,
            Err(err) => {
                events.push(EngineEvent::Degraded {
                    symbol: self.symbol.clone(),
                    trade_id: self.trades[idx].id.clone(),
                    timestamp,
                    reason: err.to_string(),
                });
                return Ok(None);
            }
        };

        let trade = &mut self.trades[idx];
        let pnl = trade.close(timestamp, fill.price, reason)?;
        trade.close_seq = Some(risk.release(&self.symbol, pnl));
        info!(
            trade_id = %trade.id,
            reason = %reason,
            exit = fill.price,
            pnl,
            "trade closed"
        );
        events.push(EngineEvent::transition(Some(TradeStatus::Open), trade));
        let closed = trade.clone();
        self.active = None;
        Ok(Some(closed))
    }

    fn cancel_active(&mut self, events: &mut Vec<EngineEvent>) -> Result<(), TradingError> {
        if let Some(idx) = self.active.take() {
            let trade = &mut self.trades[idx];
            trade.cancel()?;
            info!(trade_id = %trade.id, "trade cancelled");
            events.push(EngineEvent::transition(Some(TradeStatus::Pending), trade));
        }
        Ok(())
    }

    fn order_for(
        &self,
        idx: usize,
        action: OrderAction,
        reference_price: f64,
        timestamp: NaiveDateTime,
    ) -> OrderRequest {
        let trade = &self.trades[idx];
        OrderRequest {
            trade_id: trade.id.clone(),
            symbol: self.symbol.clone(),
            action,
            quantity: trade.quantity,
            reference_price,
            timestamp,
        }
    }

    /// Submits and confirms `order`, retrying up to `max_retries` more times.
    /// An unconfirmed order is cancelled before resubmitting.
    fn execute(
        &self,
        executor: &mut dyn ExecutionPort,
        order: &OrderRequest,
    ) -> Result<Fill, TradingError> {
        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match executor.submit_order(order) {
                Ok(order_id) => match executor.confirm_fill(&order_id) {
                    Ok(fill) => return Ok(fill),
                    Err(err) => {
                        warn!(trade_id = %order.trade_id, attempt, error = %err, "fill not confirmed");
                        if let Err(cancel_err) = executor.cancel_order(&order_id) {
                            warn!(trade_id = %order.trade_id, error = %cancel_err, "cancel failed");
                        }
                        last_error = err.to_string();
                    }
                },
                Err(err) => {
                    warn!(trade_id = %order.trade_id, attempt, error = %err, "order submission failed");
                    last_error = err.to_string();
                }
            }
        }

        warn!(trade_id = %order.trade_id, attempts, "execution retries exhausted");
        Err(TradingError::OrderExecution {
            symbol: order.symbol.clone(),
            attempts,
            reason: last_error,
        })
    }
}

fn entry_action(side: Side) -> OrderAction {
    match side {
        Side::Long => OrderAction::Buy,
        Side::Short => OrderAction::Sell,
    }
}
