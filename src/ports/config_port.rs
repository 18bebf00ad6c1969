//! Configuration access port trait.
//!
//! Absent keys fall back to the caller's default; a present but unparseable
//! value is a configuration error rather than a silent default.

use crate::domain::error::TradingError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, TradingError>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, TradingError>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, TradingError>;
}
