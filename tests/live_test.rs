//! Live driver tests: bars over an mpsc feed, snapshots on a watch channel.
#![cfg(feature = "live")]

mod common;

use approx::assert_relative_eq;
use common::*;
use crosstrader::domain::events::EngineEvent;
use crosstrader::domain::metrics::PerformanceSnapshot;
use crosstrader::domain::orchestrator::Orchestrator;
use crosstrader::domain::trade::{ExitReason, TradeStatus};
use crosstrader::live::{run_live, StopReason};
use tokio::sync::{mpsc, watch};

struct Harness {
    bars_tx: mpsc::Sender<PriceBar>,
    events_rx: mpsc::Receiver<EngineEvent>,
    snapshot_rx: watch::Receiver<PerformanceSnapshot>,
    shutdown_tx: watch::Sender<bool>,
    driver: tokio::task::JoinHandle<crosstrader::live::LiveExit>,
}

fn start_driver() -> Harness {
    let orch = Orchestrator::new(scenario_config(), Box::new(MockExecutor::new())).unwrap();
    let initial = orch.performance();
    let (bars_tx, bars_rx) = mpsc::channel(16);
    let (events_tx, events_rx) = mpsc::channel(256);
    let (snapshot_tx, snapshot_rx) = watch::channel(initial);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = tokio::spawn(run_live(orch, bars_rx, events_tx, snapshot_tx, shutdown_rx));
    Harness {
        bars_tx,
        events_rx,
        snapshot_rx,
        shutdown_tx,
        driver,
    }
}

fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn feed_close_stops_driver_and_returns_orchestrator() {
    let mut h = start_driver();
    let mut bars = crossover_bars("SBIN", ts("2024-01-15", "09:15"));
    bars.push(make_ohlc("SBIN", after(&bars, 5), 100.0, 112.0, 98.0, 110.0));
    for bar in bars {
        h.bars_tx.send(bar).await.unwrap();
    }
    drop(h.bars_tx);

    let exit = h.driver.await.unwrap();
    assert!(matches!(exit.reason, StopReason::FeedClosed));
    assert_eq!(exit.bars_processed, 6);

    let trades = exit.orchestrator.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].exit_reason, Some(ExitReason::Target));

    let snapshot = h.snapshot_rx.borrow().clone();
    assert_eq!(snapshot.total_trades, 1);
    assert_relative_eq!(snapshot.total_pnl, 396.0);

    let events = drain(&mut h.events_rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::Trade(t) if t.to == TradeStatus::Closed)));
}

#[tokio::test]
async fn shutdown_between_bars_leaves_trade_open() {
    let mut h = start_driver();
    for bar in crossover_bars("SBIN", ts("2024-01-15", "09:15")) {
        h.bars_tx.send(bar).await.unwrap();
    }

    // Wait until the entry is visible, then stop.
    loop {
        match h.events_rx.recv().await {
            Some(EngineEvent::Trade(t)) if t.to == TradeStatus::Open => break,
            Some(_) => continue,
            None => panic!("driver stopped early"),
        }
    }
    h.shutdown_tx.send(true).unwrap();

    let exit = h.driver.await.unwrap();
    assert!(matches!(exit.reason, StopReason::Shutdown));
    assert_eq!(exit.orchestrator.open_trades().len(), 1);
}

#[tokio::test]
async fn data_gap_becomes_bar_rejected_event() {
    let mut h = start_driver();
    let bars = crossover_bars("SBIN", ts("2024-01-15", "09:15"));
    h.bars_tx.send(bars[2].clone()).await.unwrap();
    h.bars_tx.send(bars[1].clone()).await.unwrap();
    h.bars_tx.send(bars[3].clone()).await.unwrap();
    drop(h.bars_tx);

    let exit = h.driver.await.unwrap();
    assert!(matches!(exit.reason, StopReason::FeedClosed));

    let rejected: Vec<_> = drain(&mut h.events_rx)
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::BarRejected { .. }))
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].symbol(), "SBIN");
}

#[tokio::test]
async fn dropped_shutdown_sender_does_not_stop_driver() {
    let h = start_driver();
    drop(h.shutdown_tx);
    for bar in crossover_bars("SBIN", ts("2024-01-15", "09:15")) {
        h.bars_tx.send(bar).await.unwrap();
    }
    drop(h.bars_tx);

    let exit = h.driver.await.unwrap();
    assert!(matches!(exit.reason, StopReason::FeedClosed));
    assert_eq!(exit.bars_processed, 5);
}

#[tokio::test]
async fn lagging_symbol_close_keeps_driver_running() {
    let mut h = start_driver();
    let mut bars = crossover_bars("AAA", ts("2024-01-15", "09:15"));
    bars.push(make_ohlc("AAA", ts("2024-01-15", "10:00"), 99.0, 100.0, 92.0, 95.0));
    let mut lagging = crossover_bars("BBB", ts("2024-01-15", "09:15"));
    lagging.push(make_ohlc("BBB", after(&lagging, 5), 99.0, 100.0, 92.0, 95.0));
    bars.extend(lagging);
    for bar in bars {
        h.bars_tx.send(bar).await.unwrap();
    }
    drop(h.bars_tx);

    let exit = h.driver.await.unwrap();
    assert!(matches!(exit.reason, StopReason::FeedClosed));
    assert_eq!(exit.bars_processed, 12);

    let snapshot = h.snapshot_rx.borrow().clone();
    assert_eq!(snapshot.total_trades, 2);
    assert_relative_eq!(snapshot.final_equity, 9_610.0);

    let closes = drain(&mut h.events_rx)
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::Trade(t) if t.to == TradeStatus::Closed))
        .count();
    assert_eq!(closes, 2);
}
