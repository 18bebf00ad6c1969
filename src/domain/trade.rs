//! Trade record and its lifecycle states.

use std::fmt;

use chrono::NaiveDateTime;

use crate::domain::error::TradingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeStatus {
    Pending,
    Open,
    Closed,
    Cancelled,
}

impl TradeStatus {
    /// PENDING -> OPEN -> CLOSED, or PENDING -> CANCELLED.
    pub fn can_transition_to(self, to: TradeStatus) -> bool {
        matches!(
            (self, to),
            (TradeStatus::Pending, TradeStatus::Open)
                | (TradeStatus::Pending, TradeStatus::Cancelled)
                | (TradeStatus::Open, TradeStatus::Closed)
        )
    }

    /// PENDING and OPEN trades occupy their symbol.
    pub fn is_active(self) -> bool {
        matches!(self, TradeStatus::Pending | TradeStatus::Open)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeStatus::Pending => "PENDING",
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
            TradeStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    StopLoss,
    Target,
    OppositeSignal,
    TimeForced,
    ForcedLiquidation,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::Target => "TARGET",
            ExitReason::OppositeSignal => "OPPOSITE_SIGNAL",
            ExitReason::TimeForced => "TIME_FORCED",
            ExitReason::ForcedLiquidation => "FORCED_LIQUIDATION",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub quantity: u64,
    pub stop_loss: f64,
    pub target: f64,
    pub exit_time: Option<NaiveDateTime>,
    pub exit_price: Option<f64>,
    pub pnl: Option<f64>,
    pub status: TradeStatus,
    pub exit_reason: Option<ExitReason>,
    /// Account-wide close order, stamped by the risk ledger on close.
    pub close_seq: Option<u64>,
}

impl Trade {
    /// Creates a PENDING trade, checking quantity and stop/target placement.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: String,
        symbol: String,
        side: Side,
        entry_time: NaiveDateTime,
        entry_price: f64,
        quantity: u64,
        stop_loss: f64,
        target: f64,
    ) -> Result<Self, TradingError> {
        if quantity == 0 {
            return Err(TradingError::InvalidTrade {
                reason: format!("{id}: quantity must be positive"),
            });
        }
        let ordered = match side {
            Side::Long => stop_loss < entry_price && entry_price < target,
            Side::Short => target < entry_price && entry_price < stop_loss,
        };
        if !ordered {
            return Err(TradingError::InvalidTrade {
                reason: format!(
                    "{id}: {side} requires stop {stop_loss} and target {target} around entry {entry_price}"
                ),
            });
        }
        Ok(Trade {
            id,
            symbol,
            side,
            entry_time,
            entry_price,
            quantity,
            stop_loss,
            target,
            exit_time: None,
            exit_price: None,
            pnl: None,
            status: TradeStatus::Pending,
            exit_reason: None,
            close_seq: None,
        })
    }

    fn transition(&mut self, to: TradeStatus) -> Result<(), TradingError> {
        if !self.status.can_transition_to(to) {
            return Err(TradingError::InvalidTransition {
                trade_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// PENDING -> OPEN at the confirmed fill price.
    pub fn open(&mut self, fill_price: f64) -> Result<(), TradingError> {
        self.transition(TradeStatus::Open)?;
        self.entry_price = fill_price;
        Ok(())
    }

    /// PENDING -> CANCELLED.
    pub fn cancel(&mut self) -> Result<(), TradingError> {
        self.transition(TradeStatus::Cancelled)
    }

    /// OPEN -> CLOSED, stamping the exit and realized pnl.
    pub fn close(
        &mut self,
        exit_time: NaiveDateTime,
        exit_price: f64,
        reason: ExitReason,
    ) -> Result<f64, TradingError> {
        self.transition(TradeStatus::Closed)?;
        let pnl = self.pnl_at(exit_price);
        self.exit_time = Some(exit_time);
        self.exit_price = Some(exit_price);
        self.exit_reason = Some(reason);
        self.pnl = Some(pnl);
        Ok(pnl)
    }

    pub fn pnl_at(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.quantity as f64
    }

    pub fn notional(&self) -> f64 {
        self.entry_price * self.quantity as f64
    }

    /// Planned reward per unit of risk.
    pub fn reward_risk(&self) -> f64 {
        let risk = (self.entry_price - self.stop_loss).abs();
        if risk > 0.0 {
            (self.target - self.entry_price).abs() / risk
        } else {
            0.0
        }
    }
}
