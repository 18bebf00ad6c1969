//! Entry and exit rules of the EMA crossover strategy.
//!
//! Pure functions of the previous and current [`IndicatorSnapshot`] plus the
//! current bar. Nothing here holds state; an absent signal is a normal result.

use crate::domain::config::EngineConfig;
use crate::domain::events::{SignalEvent, SignalKind};
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::ohlcv::PriceBar;
use crate::domain::trade::{ExitReason, Side, Trade};

/// Fast EMA crossed the slow EMA in the direction of `side` on this bar.
pub fn crossed(prev: &IndicatorSnapshot, curr: &IndicatorSnapshot, side: Side) -> bool {
    let (Some((pf, ps)), Some((cf, cs))) = (prev.emas(), curr.emas()) else {
        return false;
    };
    match side {
        Side::Long => pf <= ps && cf > cs,
        Side::Short => pf >= ps && cf < cs,
    }
}

/// Returns an ENTRY signal when every entry condition holds for one side.
pub fn evaluate_entry(
    config: &EngineConfig,
    prev: &IndicatorSnapshot,
    curr: &IndicatorSnapshot,
    bar: &PriceBar,
) -> Option<SignalEvent> {
    if config.session.is_closing(bar.timestamp.time()) {
        return None;
    }
    let side = if entry_conditions_hold(config, prev, curr, bar, Side::Long) {
        Side::Long
    } else if config.strategy.allow_short
        && entry_conditions_hold(config, prev, curr, bar, Side::Short)
    {
        Side::Short
    } else {
        return None;
    };

    Some(SignalEvent {
        kind: SignalKind::Entry,
        side,
        symbol: bar.symbol.clone(),
        timestamp: bar.timestamp,
        price: bar.close,
        snapshot: *curr,
        exit_reason: None,
    })
}

fn entry_conditions_hold(
    config: &EngineConfig,
    prev: &IndicatorSnapshot,
    curr: &IndicatorSnapshot,
    bar: &PriceBar,
    side: Side,
) -> bool {
    let params = &config.strategy;
    if !crossed(prev, curr, side) {
        return false;
    }
    let (
        Some((fast, slow)),
        Some(volume_avg),
        Some(rsi),
        Some(macd),
        Some(macd_signal),
        Some(support),
        Some(resistance),
    ) = (
        curr.emas(),
        curr.volume_avg,
        curr.rsi,
        curr.macd,
        curr.macd_signal,
        curr.support,
        curr.resistance,
    )
    else {
        return false;
    };

    let close = bar.close;
    let volume_ok = bar.volume > params.volume_multiplier * volume_avg;
    match side {
        Side::Long => {
            close > fast
                && close > slow
                && volume_ok
                && rsi < params.rsi_overbought
                && macd > macd_signal
                && (close - support).abs() / close <= params.level_tolerance
        }
        Side::Short => {
            close < fast
                && close < slow
                && volume_ok
                && rsi > params.rsi_oversold
                && macd < macd_signal
                && (close - resistance).abs() / close <= params.level_tolerance
        }
    }
}

/// Returns the single highest-priority EXIT for an OPEN trade, if any:
/// stop-loss, then target, then opposite crossover, then session close.
pub fn evaluate_exit(
    config: &EngineConfig,
    trade: &Trade,
    prev: &IndicatorSnapshot,
    curr: &IndicatorSnapshot,
    bar: &PriceBar,
) -> Option<SignalEvent> {
    let (reason, price) = exit_trigger(config, trade, prev, curr, bar)?;
    Some(SignalEvent {
        kind: SignalKind::Exit,
        side: trade.side,
        symbol: bar.symbol.clone(),
        timestamp: bar.timestamp,
        price,
        snapshot: *curr,
        exit_reason: Some(reason),
    })
}

fn exit_trigger(
    config: &EngineConfig,
    trade: &Trade,
    prev: &IndicatorSnapshot,
    curr: &IndicatorSnapshot,
    bar: &PriceBar,
) -> Option<(ExitReason, f64)> {
    let stop = trade.stop_loss;
    let target = trade.target;

    match trade.side {
        Side::Long => {
            if bar.low <= stop {
                // Gapped through: the stop order fills at the open.
                return Some((ExitReason::StopLoss, bar.open.min(stop)));
            }
            if bar.high >= target {
                return Some((ExitReason::Target, target));
            }
        }
        Side::Short => {
            if bar.high >= stop {
                return Some((ExitReason::StopLoss, bar.open.max(stop)));
            }
            if bar.low <= target {
                return Some((ExitReason::Target, target));
            }
        }
    }

    if crossed(prev, curr, trade.side.opposite()) {
        return Some((ExitReason::OppositeSignal, bar.close));
    }
    if config.session.is_closing(bar.timestamp.time()) {
        return Some((ExitReason::TimeForced, bar.close));
    }
    None
}
