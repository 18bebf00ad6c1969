//! Core domain types and logic.

pub mod config;
pub mod config_validation;
pub mod error;
pub mod events;
pub mod indicator;
pub mod lifecycle;
pub mod metrics;
pub mod ohlcv;
pub mod orchestrator;
pub mod pipeline;
pub mod risk;
pub mod signal;
pub mod trade;
