//! INI file configuration adapter.

use std::path::Path;

use configparser::ini::Ini;

use crate::domain::error::TradingError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TradingError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| TradingError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TradingError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TradingError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    fn not_a(section: &str, key: &str, kind: &str, raw: &str) -> TradingError {
        TradingError::invalid(section, key, format!("expected {kind}, got '{raw}'"))
    }

    /// Present, non-empty raw value.
    fn raw(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, TradingError> {
        match self.raw(section, key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| Self::not_a(section, key, "an integer", &raw)),
        }
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, TradingError> {
        match self.raw(section, key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| Self::not_a(section, key, "a number", &raw)),
        }
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, TradingError> {
        match self.raw(section, key) {
            None => Ok(default),
            Some(raw) => {
                Self::parse_bool(&raw).ok_or_else(|| Self::not_a(section, key, "a boolean", &raw))
            }
        }
    }
}
