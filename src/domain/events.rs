//! Events published by the engine. Each carries its payload by value.

use chrono::NaiveDateTime;

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::trade::{ExitReason, Side, Trade, TradeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Entry,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub kind: SignalKind,
    pub side: Side,
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    /// Entry reference price, or the exit fill level for exits.
    pub price: f64,
    pub snapshot: IndicatorSnapshot,
    pub exit_reason: Option<ExitReason>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    /// `None` when the trade is first created.
    pub from: Option<TradeStatus>,
    pub to: TradeStatus,
    pub trade: Trade,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Signal(SignalEvent),
    Trade(TradeEvent),
    /// The execution collaborator kept failing; the trade was not dropped.
    Degraded {
        symbol: String,
        trade_id: String,
        timestamp: NaiveDateTime,
        reason: String,
    },
    /// An entry refused by sizing or risk caps.
    Rejected {
        symbol: String,
        timestamp: NaiveDateTime,
        reason: String,
    },
    /// A bar refused as malformed or out of order.
    BarRejected {
        symbol: String,
        timestamp: NaiveDateTime,
        reason: String,
    },
}

impl EngineEvent {
    pub fn symbol(&self) -> &str {
        match self {
            EngineEvent::Signal(s) => &s.symbol,
            EngineEvent::Trade(t) => &t.trade.symbol,
            EngineEvent::Degraded { symbol, .. }
            | EngineEvent::Rejected { symbol, .. }
            | EngineEvent::BarRejected { symbol, .. } => symbol,
        }
    }

    pub(crate) fn transition(from: Option<TradeStatus>, trade: &Trade) -> Self {
        EngineEvent::Trade(TradeEvent {
            from,
            to: trade.status,
            trade: trade.clone(),
        })
    }
}
