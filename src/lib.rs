//! crosstrader: EMA crossover signal engine shared by backtest, paper and live trading.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. The async live/paper driver lives in
//! [`live`] behind the `live` feature.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
#[cfg(feature = "live")]
pub mod live;
