//! Position sizing, stop/target derivation and account-wide risk caps.
//!
//! Sizing and derivation are pure functions. The caps (open positions, capital
//! per trade, uncommitted capital, daily loss halt) live in one [`RiskManager`]
//! whose ledger sits behind a single `Mutex`, so several symbol pipelines can
//! share it through an `Arc`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::config::{RiskParams, StrategyParams};
use crate::domain::error::TradingError;
use crate::domain::events::SignalEvent;
use crate::domain::trade::Side;

/// quantity = floor(capital * risk_fraction / |entry - stop|).
pub fn size_position(
    capital: f64,
    risk_fraction: f64,
    entry_price: f64,
    stop_loss_price: f64,
) -> Result<u64, TradingError> {
    let distance = (entry_price - stop_loss_price).abs();
    if !distance.is_finite() || distance == 0.0 {
        return Err(TradingError::InvalidTrade {
            reason: format!("risk distance between entry {entry_price} and stop {stop_loss_price} is zero"),
        });
    }
    let quantity = (capital * risk_fraction / distance).floor();
    if !quantity.is_finite() || quantity < 1.0 {
        return Err(TradingError::InvalidTrade {
            reason: format!(
                "risk budget {:.2} buys less than one unit at distance {distance}",
                capital * risk_fraction
            ),
        });
    }
    Ok(quantity as u64)
}

/// Stop at the swing reference; target `reward_risk_ratio` risk-distances away.
pub fn derive_stop_and_target(
    entry_price: f64,
    side: Side,
    swing_reference: f64,
    reward_risk_ratio: f64,
) -> Result<(f64, f64), TradingError> {
    let on_losing_side = match side {
        Side::Long => swing_reference < entry_price,
        Side::Short => swing_reference > entry_price,
    };
    if !swing_reference.is_finite() || !on_losing_side {
        return Err(TradingError::InvalidTrade {
            reason: format!(
                "swing reference {swing_reference} is not below/above {side} entry {entry_price}"
            ),
        });
    }
    let distance = (entry_price - swing_reference).abs();
    let target = entry_price + side.sign() * reward_risk_ratio * distance;
    Ok((swing_reference, target))
}

/// Stop, target and size for an accepted entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradePlan {
    pub stop_loss: f64,
    pub target: f64,
    pub quantity: u64,
}

#[derive(Debug, Default)]
struct RiskLedger {
    realized_pnl: f64,
    session: Option<NaiveDate>,
    session_start_equity: f64,
    daily_pnl: f64,
    halted: bool,
    /// Closes booked so far.
    closes: u64,
    /// Notional committed per symbol.
    open: HashMap<String, f64>,
}

#[derive(Debug)]
pub struct RiskManager {
    params: RiskParams,
    ledger: Mutex<RiskLedger>,
}

impl RiskManager {
    pub fn new(params: RiskParams) -> Self {
        let ledger = RiskLedger {
            session_start_equity: params.initial_capital,
            ..RiskLedger::default()
        };
        RiskManager {
            params,
            ledger: Mutex::new(ledger),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, RiskLedger> {
        // The ledger is updated field by field without panicking paths, so a
        // poisoned lock still holds consistent data.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    /// Initial capital plus realized pnl.
    pub fn equity(&self) -> f64 {
        self.params.initial_capital + self.ledger().realized_pnl
    }

    pub fn is_halted(&self) -> bool {
        self.ledger().halted
    }

    pub fn open_positions(&self) -> usize {
        self.ledger().open.len()
    }

    pub fn daily_pnl(&self) -> f64 {
        self.ledger().daily_pnl
    }

    pub fn committed_capital(&self) -> f64 {
        self.ledger().open.values().sum()
    }

    /// Starts a new session when `date` is later than the current one,
    /// resetting the daily loss counter and lifting a halt.
    pub fn roll_session(&self, date: NaiveDate) {
        let mut ledger = self.ledger();
        if ledger.session.is_some_and(|current| date <= current) {
            return;
        }
        if ledger.halted {
            info!(%date, "new session, lifting daily loss halt");
        }
        ledger.session = Some(date);
        ledger.session_start_equity = self.params.initial_capital + ledger.realized_pnl;
        ledger.daily_pnl = 0.0;
        ledger.halted = false;
    }

    /// Derives stop and target from the signal's swing extreme, then sizes
    /// against current equity.
    pub fn plan(
        &self,
        signal: &SignalEvent,
        strategy: &StrategyParams,
    ) -> Result<TradePlan, TradingError> {
        let swing = match signal.side {
            Side::Long => signal
                .snapshot
                .swing_low
                .map(|low| low * (1.0 - strategy.swing_buffer)),
            Side::Short => signal
                .snapshot
                .swing_high
                .map(|high| high * (1.0 + strategy.swing_buffer)),
        }
        .ok_or_else(|| TradingError::InvalidTrade {
            reason: format!("no swing reference for {} yet", signal.symbol),
        })?;

        let (stop_loss, target) =
            derive_stop_and_target(signal.price, signal.side, swing, strategy.reward_risk_ratio)?;
        let quantity = size_position(
            self.equity(),
            self.params.risk_per_trade,
            signal.price,
            stop_loss,
        )?;
        Ok(TradePlan {
            stop_loss,
            target,
            quantity,
        })
    }

    /// Commits capital and a position slot for `symbol`.
    ///
    /// The quantity is clamped down to the per-trade capital cap and to the
    /// uncommitted capital; the clamped quantity is returned.
    pub fn reserve(&self, symbol: &str, quantity: u64, entry_price: f64) -> Result<u64, TradingError> {
        let mut ledger = self.ledger();
        let reject = |reason: String| TradingError::InsufficientCapital {
            symbol: symbol.to_string(),
            reason,
        };

        if ledger.halted {
            return Err(reject(format!(
                "daily loss limit reached ({:.2} today)",
                ledger.daily_pnl
            )));
        }
        if ledger.open.contains_key(symbol) {
            return Err(reject("symbol already has an active trade".into()));
        }
        if ledger.open.len() >= self.params.max_open_positions {
            return Err(reject(format!(
                "max open positions ({}) reached",
                self.params.max_open_positions
            )));
        }

        let equity = self.params.initial_capital + ledger.realized_pnl;
        let committed: f64 = ledger.open.values().sum();
        let budget = (self.params.max_capital_per_trade * equity).min(equity - committed);
        let affordable = if budget > 0.0 {
            (budget / entry_price).floor()
        } else {
            0.0
        };
        let clamped = (quantity as f64).min(affordable);
        if clamped < 1.0 {
            return Err(reject(format!(
                "capital budget {budget:.2} buys less than one unit at {entry_price}"
            )));
        }

        let clamped = clamped as u64;
        ledger
            .open
            .insert(symbol.to_string(), clamped as f64 * entry_price);
        Ok(clamped)
    }

    /// Replaces `symbol`'s reservation with the notional actually filled.
    pub fn confirm_fill(&self, symbol: &str, quantity: u64, fill_price: f64) {
        if let Some(notional) = self.ledger().open.get_mut(symbol) {
            *notional = quantity as f64 * fill_price;
        }
    }

    /// Releases a closed trade's reservation and books its pnl.
    ///
    /// Returns the close's sequence number. Sequence numbers increase
    /// strictly across every symbol sharing this ledger.
    pub fn release(&self, symbol: &str, pnl: f64) -> u64 {
        let mut ledger = self.ledger();
        ledger.open.remove(symbol);
        ledger.realized_pnl += pnl;
        ledger.daily_pnl += pnl;
        ledger.closes += 1;

        let limit = self.params.daily_loss_limit * ledger.session_start_equity;
        if !ledger.halted && ledger.daily_pnl <= -limit {
            ledger.halted = true;
            warn!(
                symbol,
                daily_pnl = ledger.daily_pnl,
                limit,
                "daily loss limit reached, halting new entries"
            );
        }
        ledger.closes
    }

    /// Drops a reservation whose trade never opened.
    pub fn cancel(&self, symbol: &str) {
        self.ledger().open.remove(symbol);
    }
}
