//! Async live/paper driver.
//!
//! Bars arrive on an mpsc channel and are processed one at a time through the
//! same [`Orchestrator::process_bar`] path a backtest uses. The shutdown
//! signal is only observed between bars.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::error::TradingError;
use crate::domain::events::EngineEvent;
use crate::domain::metrics::PerformanceSnapshot;
use crate::domain::ohlcv::PriceBar;
use crate::domain::orchestrator::Orchestrator;

#[derive(Debug)]
pub enum StopReason {
    Shutdown,
    FeedClosed,
    Failed(TradingError),
}

/// Returned when the driver stops; the orchestrator is handed back for final
/// reporting.
pub struct LiveExit {
    pub orchestrator: Orchestrator,
    pub reason: StopReason,
    pub bars_processed: usize,
}

pub async fn run_live(
    mut orchestrator: Orchestrator,
    mut bars_rx: mpsc::Receiver<PriceBar>,
    events_tx: mpsc::Sender<EngineEvent>,
    snapshot_tx: watch::Sender<PerformanceSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> LiveExit {
    let mut bars_processed = 0;
    let mut shutdown_open = true;
    snapshot_tx.send_replace(orchestrator.performance());
    info!("live driver started");

    let reason = loop {
        if *shutdown_rx.borrow() {
            break StopReason::Shutdown;
        }

        let bar = tokio::select! {
            biased;
            changed = shutdown_rx.changed(), if shutdown_open => {
                if changed.is_err() {
                    // Sender gone: no shutdown can arrive any more.
                    shutdown_open = false;
                }
                continue;
            }
            bar = bars_rx.recv() => bar,
        };
        let Some(bar) = bar else {
            break StopReason::FeedClosed;
        };

        let events = match orchestrator.process_bar(&bar) {
            Ok(events) => events,
            Err(TradingError::DataGap {
                symbol,
                timestamp,
                reason,
            }) => vec![EngineEvent::BarRejected {
                symbol,
                timestamp,
                reason,
            }],
            Err(err) => break StopReason::Failed(err),
        };
        bars_processed += 1;

        for event in events {
            if events_tx.send(event).await.is_err() {
                debug!("event receiver dropped");
                break;
            }
        }
        snapshot_tx.send_replace(orchestrator.performance());
    };

    match &reason {
        StopReason::Failed(err) => warn!(error = %err, bars_processed, "live driver failed"),
        _ => info!(?reason, bars_processed, "live driver stopped"),
    }
    LiveExit {
        orchestrator,
        reason,
        bars_processed,
    }
}
