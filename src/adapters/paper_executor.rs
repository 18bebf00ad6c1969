//! Simulated execution venue for backtests and paper trading.
//!
//! Orders fill immediately at the reference price moved against the trader by
//! `slippage_pct` percent.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::ports::execution_port::{
    BrokerPosition, ExecutionError, ExecutionPort, Fill, OrderAction, OrderId, OrderRequest,
};

/// Buy: market_price * (1 + slippage_pct / 100).
pub fn apply_slippage_buy(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Sell: market_price * (1 - slippage_pct / 100).
pub fn apply_slippage_sell(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

#[derive(Debug, Default)]
pub struct PaperExecutor {
    slippage_pct: f64,
    next_id: u64,
    working: HashMap<OrderId, OrderRequest>,
    positions: BTreeMap<String, i64>,
    fills: Vec<Fill>,
}

impl PaperExecutor {
    pub fn new(slippage_pct: f64) -> Self {
        PaperExecutor {
            slippage_pct,
            ..PaperExecutor::default()
        }
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }
}

impl ExecutionPort for PaperExecutor {
    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderId, ExecutionError> {
        if order.quantity == 0 {
            return Err(ExecutionError::Rejected("zero quantity".into()));
        }
        if !(order.reference_price.is_finite() && order.reference_price > 0.0) {
            return Err(ExecutionError::Rejected(format!(
                "invalid reference price {}",
                order.reference_price
            )));
        }
        self.next_id += 1;
        let id = OrderId(format!("paper-{}", self.next_id));
        self.working.insert(id.clone(), order.clone());
        Ok(id)
    }

    fn confirm_fill(&mut self, order_id: &OrderId) -> Result<Fill, ExecutionError> {
        let order = self
            .working
            .remove(order_id)
            .ok_or_else(|| ExecutionError::Unconfirmed(format!("unknown order {}", order_id.0)))?;

        let (price, delta) = match order.action {
            OrderAction::Buy => (
                apply_slippage_buy(order.reference_price, self.slippage_pct),
                order.quantity as i64,
            ),
            OrderAction::Sell => (
                apply_slippage_sell(order.reference_price, self.slippage_pct),
                -(order.quantity as i64),
            ),
        };

        let net = self.positions.entry(order.symbol.clone()).or_insert(0);
        *net += delta;
        if *net == 0 {
            self.positions.remove(&order.symbol);
        }

        debug!(order_id = %order_id.0, symbol = %order.symbol, price, "paper fill");
        let fill = Fill {
            order_id: order_id.clone(),
            price,
            quantity: order.quantity,
        };
        self.fills.push(fill.clone());
        Ok(fill)
    }

    fn cancel_order(&mut self, order_id: &OrderId) -> Result<(), ExecutionError> {
        self.working.remove(order_id);
        Ok(())
    }

    fn fetch_positions(&self) -> Result<Vec<BrokerPosition>, ExecutionError> {
        Ok(self
            .positions
            .iter()
            .map(|(symbol, &quantity)| BrokerPosition {
                symbol: symbol.clone(),
                quantity,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn order(action: OrderAction, quantity: u64, price: f64) -> OrderRequest {
        OrderRequest {
            trade_id: "SBIN-1".into(),
            symbol: "SBIN".into(),
            action,
            quantity,
            reference_price: price,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn slippage_moves_against_trader() {
        assert!((apply_slippage_buy(100.0, 0.5) - 100.5).abs() < 1e-9);
        assert!((apply_slippage_sell(100.0, 0.5) - 99.5).abs() < 1e-9);
        assert!((apply_slippage_buy(100.0, 0.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fills_and_tracks_positions() {
        let mut exec = PaperExecutor::new(0.0);
        let id = exec.submit_order(&order(OrderAction::Buy, 10, 100.0)).unwrap();
        let fill = exec.confirm_fill(&id).unwrap();
        assert_eq!(fill.quantity, 10);
        assert!((fill.price - 100.0).abs() < f64::EPSILON);
        assert_eq!(
            exec.fetch_positions().unwrap(),
            vec![BrokerPosition {
                symbol: "SBIN".into(),
                quantity: 10
            }]
        );

        let id = exec.submit_order(&order(OrderAction::Sell, 10, 101.0)).unwrap();
        exec.confirm_fill(&id).unwrap();
        assert!(exec.fetch_positions().unwrap().is_empty());
        assert_eq!(exec.fills().len(), 2);
    }

    #[test]
    fn short_position_is_negative() {
        let mut exec = PaperExecutor::new(0.1);
        let id = exec.submit_order(&order(OrderAction::Sell, 5, 100.0)).unwrap();
        let fill = exec.confirm_fill(&id).unwrap();
        assert!(fill.price < 100.0);
        assert_eq!(exec.fetch_positions().unwrap()[0].quantity, -5);
    }

    #[test]
    fn rejects_bad_orders() {
        let mut exec = PaperExecutor::new(0.0);
        assert!(exec.submit_order(&order(OrderAction::Buy, 0, 100.0)).is_err());
        assert!(exec.submit_order(&order(OrderAction::Buy, 1, f64::NAN)).is_err());
    }

    #[test]
    fn cancelled_order_cannot_fill() {
        let mut exec = PaperExecutor::new(0.0);
        let id = exec.submit_order(&order(OrderAction::Buy, 1, 100.0)).unwrap();
        exec.cancel_order(&id).unwrap();
        assert!(matches!(
            exec.confirm_fill(&id),
            Err(ExecutionError::Unconfirmed(_))
        ));
    }
}
