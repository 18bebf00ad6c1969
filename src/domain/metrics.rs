//! Performance analytics over closed trades.
//!
//! [`PerformanceAnalyzer`] folds CLOSED trades in one at a time (live), while
//! [`PerformanceSnapshot::recompute`] derives the same figures from a full
//! trade history (backtest). Both accumulate in close order with the same
//! arithmetic, so they agree exactly.
//!
//! Close order is the risk ledger's close sequence when trades carry one, then
//! exit time, then id. Equity points never step back in time: a close whose
//! exit time precedes the previous point is stamped at that point's time.

use chrono::NaiveDateTime;

use crate::domain::config::PerformanceParams;
use crate::domain::error::TradingError;
use crate::domain::trade::{Trade, TradeStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    /// (peak - equity) / peak, as a fraction.
    pub drawdown: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSnapshot {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_pnl: f64,
    pub total_return: f64,
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// +inf with profits and no losses; 0.0 with neither.
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub expectancy: f64,
    pub avg_reward_risk: f64,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    pub sharpe_ratio: f64,
}

/// Pnl closed within one sampling interval.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    key: i64,
    start_equity: f64,
    pnl: f64,
}

/// Running totals shared by the incremental and full computations.
#[derive(Debug, Clone, Default, PartialEq)]
struct Totals {
    total_trades: usize,
    wins: usize,
    losses: usize,
    gross_profit: f64,
    gross_loss: f64,
    largest_win: f64,
    largest_loss: f64,
    reward_risk_sum: f64,
    total_pnl: f64,
}

impl Totals {
    fn add(&mut self, trade: &Trade, pnl: f64) {
        self.total_trades += 1;
        self.total_pnl += pnl;
        self.reward_risk_sum += trade.reward_risk();
        if pnl > 0.0 {
            self.wins += 1;
            self.gross_profit += pnl;
            if pnl > self.largest_win {
                self.largest_win = pnl;
            }
        } else if pnl < 0.0 {
            self.losses += 1;
            self.gross_loss += pnl.abs();
            if pnl.abs() > self.largest_loss {
                self.largest_loss = pnl.abs();
            }
        }
    }
}

fn bucket_key(timestamp: NaiveDateTime, params: &PerformanceParams) -> i64 {
    let interval = params.sampling_interval().num_seconds().max(1);
    timestamp.and_utc().timestamp().div_euclid(interval)
}

fn push_bucket(buckets: &mut Vec<Bucket>, key: i64, equity_before: f64, pnl: f64) {
    match buckets.last_mut() {
        Some(last) if last.key == key => last.pnl += pnl,
        _ => buckets.push(Bucket {
            key,
            start_equity: equity_before,
            pnl,
        }),
    }
}

/// Annualized Sharpe over per-interval returns; intervals without closes are skipped.
fn sharpe(buckets: &[Bucket], params: &PerformanceParams) -> f64 {
    if buckets.len() < 2 {
        return 0.0;
    }
    let mut returns = Vec::with_capacity(buckets.len());
    for b in buckets {
        returns.push(if b.start_equity > 0.0 {
            b.pnl / b.start_equity
        } else {
            0.0
        });
    }

    let n = returns.len() as f64;
    let mut sum = 0.0;
    for r in &returns {
        sum += r;
    }
    let mean = sum / n;
    let mut sq = 0.0;
    for r in &returns {
        sq += (r - mean).powi(2);
    }
    let stddev = (sq / (n - 1.0)).sqrt();
    if stddev > 0.0 && stddev.is_finite() {
        let excess = mean - params.risk_free_rate / params.periods_per_year;
        excess / stddev * params.periods_per_year.sqrt()
    } else {
        0.0
    }
}

fn snapshot_from(
    initial_capital: f64,
    totals: &Totals,
    equity: f64,
    max_drawdown: f64,
    current_drawdown: f64,
    sharpe_ratio: f64,
) -> PerformanceSnapshot {
    let n = totals.total_trades;
    let ratio = |num: usize| if n > 0 { num as f64 / n as f64 } else { 0.0 };
    let win_rate = ratio(totals.wins);
    let loss_rate = ratio(totals.losses);

    let profit_factor = if totals.gross_loss > 0.0 {
        totals.gross_profit / totals.gross_loss
    } else if totals.gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    let avg_win = if totals.wins > 0 {
        totals.gross_profit / totals.wins as f64
    } else {
        0.0
    };
    let avg_loss = if totals.losses > 0 {
        totals.gross_loss / totals.losses as f64
    } else {
        0.0
    };

    PerformanceSnapshot {
        initial_capital,
        final_equity: equity,
        total_pnl: totals.total_pnl,
        total_return: if initial_capital > 0.0 {
            (equity - initial_capital) / initial_capital
        } else {
            0.0
        },
        total_trades: n,
        wins: totals.wins,
        losses: totals.losses,
        breakeven: n - totals.wins - totals.losses,
        win_rate,
        gross_profit: totals.gross_profit,
        gross_loss: totals.gross_loss,
        profit_factor,
        avg_win,
        avg_loss,
        largest_win: totals.largest_win,
        largest_loss: totals.largest_loss,
        expectancy: win_rate * avg_win - loss_rate * avg_loss,
        avg_reward_risk: if n > 0 {
            totals.reward_risk_sum / n as f64
        } else {
            0.0
        },
        max_drawdown,
        current_drawdown,
        sharpe_ratio,
    }
}

fn closed_pnl(trade: &Trade) -> Result<(NaiveDateTime, f64), TradingError> {
    match (trade.status, trade.exit_time, trade.pnl) {
        (TradeStatus::Closed, Some(exit_time), Some(pnl)) => Ok((exit_time, pnl)),
        _ => Err(TradingError::InvalidTrade {
            reason: format!("trade {} is {}, not closed", trade.id, trade.status),
        }),
    }
}

type CloseKey<'a> = (Option<u64>, NaiveDateTime, &'a str);

fn close_key(trade: &Trade) -> Result<CloseKey<'_>, TradingError> {
    let (exit_time, _) = closed_pnl(trade)?;
    Ok((trade.close_seq, exit_time, trade.id.as_str()))
}

/// Equity point time for a close following `previous`.
fn stamp(previous: Option<NaiveDateTime>, exit_time: NaiveDateTime) -> NaiveDateTime {
    previous.map_or(exit_time, |prev| prev.max(exit_time))
}

/// Incremental analytics, fed each trade as it closes.
#[derive(Debug, Clone)]
pub struct PerformanceAnalyzer {
    params: PerformanceParams,
    initial_capital: f64,
    equity: f64,
    peak: f64,
    max_drawdown: f64,
    totals: Totals,
    buckets: Vec<Bucket>,
    equity_curve: Vec<EquityPoint>,
    history: Vec<Trade>,
}

impl PerformanceAnalyzer {
    pub fn new(initial_capital: f64, params: PerformanceParams) -> Self {
        PerformanceAnalyzer {
            params,
            initial_capital,
            equity: initial_capital,
            peak: initial_capital,
            max_drawdown: 0.0,
            totals: Totals::default(),
            buckets: Vec::new(),
            equity_curve: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Replays a trade history in close order.
    pub fn from_trades(
        initial_capital: f64,
        params: PerformanceParams,
        trades: &[Trade],
    ) -> Result<Self, TradingError> {
        let mut analyzer = PerformanceAnalyzer::new(initial_capital, params);
        for trade in sorted_closed(trades)? {
            analyzer.record(trade)?;
        }
        Ok(analyzer)
    }

    /// Appends one CLOSED trade.
    ///
    /// Closes are expected in the order the account booked them. A trade
    /// that sorts at or before the last recorded one (a replay, or a
    /// sequence-less trade closed earlier) is `OutOfOrder` and changes nothing.
    pub fn record(&mut self, trade: &Trade) -> Result<&EquityPoint, TradingError> {
        let (exit_time, pnl) = closed_pnl(trade)?;
        if let Some(last) = self.history.last() {
            let last_key = close_key(last)?;
            if close_key(trade)? <= last_key {
                return Err(TradingError::OutOfOrder {
                    trade_id: trade.id.clone(),
                    reason: format!(
                        "close {:?} at {exit_time} does not follow {} (close {:?} at {})",
                        trade.close_seq, last.id, last_key.0, last_key.1
                    ),
                });
            }
        }

        let timestamp = stamp(self.equity_curve.last().map(|p| p.timestamp), exit_time);
        push_bucket(
            &mut self.buckets,
            bucket_key(timestamp, &self.params),
            self.equity,
            pnl,
        );
        self.totals.add(trade, pnl);
        self.equity += pnl;
        if self.equity > self.peak {
            self.peak = self.equity;
        }
        let drawdown = if self.peak > 0.0 {
            (self.peak - self.equity) / self.peak
        } else {
            0.0
        };
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }

        self.history.push(trade.clone());
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity: self.equity,
            drawdown,
        });
        Ok(&self.equity_curve[self.equity_curve.len() - 1])
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        snapshot_from(
            self.initial_capital,
            &self.totals,
            self.equity,
            self.max_drawdown,
            self.equity_curve.last().map_or(0.0, |p| p.drawdown),
            sharpe(&self.buckets, &self.params),
        )
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn history(&self) -> &[Trade] {
        &self.history
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }
}

fn sorted_closed(trades: &[Trade]) -> Result<Vec<&Trade>, TradingError> {
    let mut closed = Vec::with_capacity(trades.len());
    for t in trades {
        closed.push((close_key(t)?, t));
    }
    closed.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(closed.into_iter().map(|(_, t)| t).collect())
}

impl PerformanceSnapshot {
    /// Full recomputation from a trade history in any order.
    pub fn recompute(
        initial_capital: f64,
        params: &PerformanceParams,
        trades: &[Trade],
    ) -> Result<Self, TradingError> {
        let sorted = sorted_closed(trades)?;
        let curve = equity_curve(initial_capital, &sorted)?;

        let mut totals = Totals::default();
        let mut buckets = Vec::new();
        let mut equity = initial_capital;
        for (trade, point) in sorted.iter().zip(&curve) {
            let (_, pnl) = closed_pnl(trade)?;
            push_bucket(&mut buckets, bucket_key(point.timestamp, params), equity, pnl);
            totals.add(trade, pnl);
            equity += pnl;
        }

        let max_drawdown = curve.iter().fold(0.0_f64, |acc, p| acc.max(p.drawdown));
        Ok(snapshot_from(
            initial_capital,
            &totals,
            equity,
            max_drawdown,
            curve.last().map_or(0.0, |p| p.drawdown),
            sharpe(&buckets, params),
        ))
    }
}

/// Equity curve of a history already in close order.
fn equity_curve(initial_capital: f64, sorted: &[&Trade]) -> Result<Vec<EquityPoint>, TradingError> {
    let mut curve: Vec<EquityPoint> = Vec::with_capacity(sorted.len());
    let mut equity = initial_capital;
    let mut peak = initial_capital;
    for trade in sorted {
        let (exit_time, pnl) = closed_pnl(trade)?;
        let timestamp = stamp(curve.last().map(|p| p.timestamp), exit_time);
        equity += pnl;
        peak = peak.max(equity);
        let drawdown = if peak > 0.0 { (peak - equity) / peak } else { 0.0 };
        curve.push(EquityPoint {
            timestamp,
            equity,
            drawdown,
        });
    }
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::{ExitReason, Side};
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    fn closed(id: &str, pnl: f64, exit_offset_days: i64) -> Trade {
        let mut t = Trade::pending(
            id.into(),
            "SBIN".into(),
            Side::Long,
            t0(),
            100.0,
            100,
            98.0,
            104.0,
        )
        .unwrap();
        t.open(100.0).unwrap();
        t.close(
            t0() + Duration::days(exit_offset_days),
            100.0 + pnl / 100.0,
            ExitReason::OppositeSignal,
        )
        .unwrap();
        t
    }

    fn params() -> PerformanceParams {
        PerformanceParams::default()
    }

    #[test]
    fn empty_analyzer() {
        let s = PerformanceAnalyzer::new(10_000.0, params()).snapshot();
        assert_eq!(s.total_trades, 0);
        assert!(s.profit_factor.abs() < f64::EPSILON);
        assert!(s.win_rate.abs() < f64::EPSILON);
        assert!(s.sharpe_ratio.abs() < f64::EPSILON);
        assert!((s.final_equity - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wins_losses_and_profit_factor() {
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        for t in [
            closed("A", 100.0, 0),
            closed("B", -50.0, 1),
            closed("C", 200.0, 2),
            closed("D", 0.0, 3),
        ] {
            a.record(&t).unwrap();
        }
        let s = a.snapshot();
        assert_eq!(s.wins, 2);
        assert_eq!(s.losses, 1);
        assert_eq!(s.breakeven, 1);
        assert!((s.win_rate - 0.5).abs() < f64::EPSILON);
        assert!((s.profit_factor - 6.0).abs() < 1e-9);
        assert!((s.avg_win - 150.0).abs() < 1e-9);
        assert!((s.avg_loss - 50.0).abs() < 1e-9);
        assert!((s.largest_win - 200.0).abs() < 1e-9);
        assert!((s.largest_loss - 50.0).abs() < 1e-9);
        assert!((s.total_pnl - 250.0).abs() < 1e-9);
        assert!((s.expectancy - (0.5 * 150.0 - 0.25 * 50.0)).abs() < 1e-9);
        assert!((s.avg_reward_risk - 2.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_sentinels() {
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        a.record(&closed("A", 100.0, 0)).unwrap();
        assert!(a.snapshot().profit_factor.is_infinite());

        let mut b = PerformanceAnalyzer::new(10_000.0, params());
        b.record(&closed("A", 0.0, 0)).unwrap();
        assert!(b.snapshot().profit_factor.abs() < f64::EPSILON);
    }

    #[test]
    fn drawdown_tracks_peak() {
        let mut a = PerformanceAnalyzer::new(100.0, params());
        for (i, pnl) in [10.0, -20.0, 5.0, -15.0, 20.0].iter().enumerate() {
            a.record(&closed(&format!("T{i}"), *pnl, i as i64)).unwrap();
        }
        let s = a.snapshot();
        // peak 110, trough 80
        assert!((s.max_drawdown - 30.0 / 110.0).abs() < 1e-9);
        assert!((s.current_drawdown - 10.0 / 110.0).abs() < 1e-9);
        let curve = a.equity_curve();
        assert_eq!(curve.len(), 5);
        assert!((curve[1].drawdown - 20.0 / 110.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_order_close_rejected() {
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        a.record(&closed("A", 10.0, 2)).unwrap();
        let err = a.record(&closed("B", 10.0, 1)).unwrap_err();
        assert!(matches!(err, TradingError::OutOfOrder { .. }));
        assert_eq!(a.snapshot().total_trades, 1);
    }

    #[test]
    fn same_timestamp_closes_accepted() {
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        a.record(&closed("A", 10.0, 1)).unwrap();
        assert!(a.record(&closed("B", -5.0, 1)).is_ok());
    }

    fn sequenced(id: &str, pnl: f64, exit_offset_days: i64, seq: u64) -> Trade {
        Trade {
            close_seq: Some(seq),
            ..closed(id, pnl, exit_offset_days)
        }
    }

    #[test]
    fn sequenced_close_with_earlier_exit_time_is_accepted() {
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        a.record(&sequenced("INFY-1", 100.0, 2, 1)).unwrap();
        let point = *a.record(&sequenced("SBIN-1", -50.0, 1, 2)).unwrap();

        assert_eq!(point.timestamp, t0() + Duration::days(2));
        assert!((point.equity - 10_050.0).abs() < 1e-9);
        assert_eq!(a.history().len(), 2);
        let curve = a.equity_curve();
        assert!(curve.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn replayed_sequence_rejected() {
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        a.record(&sequenced("A", 10.0, 1, 1)).unwrap();
        a.record(&sequenced("B", 10.0, 0, 2)).unwrap();
        let err = a.record(&sequenced("A", 10.0, 1, 1)).unwrap_err();
        assert!(matches!(err, TradingError::OutOfOrder { .. }));
        assert_eq!(a.snapshot().total_trades, 2);
    }

    #[test]
    fn recompute_follows_close_sequence_not_id() {
        // Same exit time; ids sort opposite to the booking order.
        let trades = vec![
            sequenced("Z", -300.0, 1, 1),
            sequenced("A", 500.0, 1, 2),
            sequenced("M", -400.0, 1, 3),
        ];
        let mut a = PerformanceAnalyzer::new(1_000.0, params());
        for t in &trades {
            a.record(t).unwrap();
        }
        let mut shuffled = trades.clone();
        shuffled.reverse();
        let full = PerformanceSnapshot::recompute(1_000.0, &params(), &shuffled).unwrap();
        assert_eq!(a.snapshot(), full);
        // 1000 -> 700 -> 1200 -> 800; id order would peak at 1500.
        assert!((full.max_drawdown - 400.0 / 1_200.0).abs() < 1e-9);
        assert!((full.current_drawdown - 400.0 / 1_200.0).abs() < 1e-9);
    }

    #[test]
    fn open_trade_rejected() {
        let mut t = Trade::pending("X".into(), "SBIN".into(), Side::Long, t0(), 100.0, 1, 98.0, 104.0)
            .unwrap();
        t.open(100.0).unwrap();
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        assert!(a.record(&t).is_err());
    }

    #[test]
    fn sharpe_uses_interval_returns() {
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        // two closes on day 0 share a bucket
        a.record(&closed("A", 100.0, 0)).unwrap();
        a.record(&closed("B", 100.0, 0)).unwrap();
        a.record(&closed("C", -100.0, 1)).unwrap();
        let s = a.snapshot();

        let r1: f64 = 200.0 / 10_000.0;
        let r2: f64 = -100.0 / 10_200.0;
        let mean = (r1 + r2) / 2.0;
        let sd = (((r1 - mean).powi(2) + (r2 - mean).powi(2)) / 1.0).sqrt();
        let expected = mean / sd * 252.0_f64.sqrt();
        assert!((s.sharpe_ratio - expected).abs() < 1e-9);
    }

    #[test]
    fn recompute_matches_incremental_in_any_input_order() {
        let trades = vec![
            closed("A", 120.0, 0),
            closed("B", -80.0, 1),
            closed("C", 40.0, 1),
            closed("D", -10.0, 3),
        ];
        let mut a = PerformanceAnalyzer::new(10_000.0, params());
        for t in &trades {
            a.record(t).unwrap();
        }
        let mut shuffled = trades.clone();
        shuffled.reverse();
        let full = PerformanceSnapshot::recompute(10_000.0, &params(), &shuffled).unwrap();
        assert_eq!(a.snapshot(), full);

        let replayed = PerformanceAnalyzer::from_trades(10_000.0, params(), &shuffled).unwrap();
        assert_eq!(replayed.snapshot(), full);
        assert_eq!(replayed.equity_curve(), a.equity_curve());
    }
}
