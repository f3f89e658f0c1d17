use std::time::Duration;

use crate::error::{Error, Result};
use crate::payroll::{WeeklyTrigger, DEFAULT_PAY_RATE};
use crate::storage::repository;
use crate::storage::{Database, DEFAULT_QUERY_TIMEOUT, DEFAULT_READER_POOL};

pub const KEY_PAY_RATE: &str = "pay_rate";
pub const KEY_SALE_UNIT_PRICE: &str = "sale_unit_price";
pub const KEY_PAY_WEEKDAY: &str = "pay_trigger_weekday";
pub const KEY_PAY_TIME: &str = "pay_trigger_time";
pub const KEY_QUERY_TIMEOUT_MS: &str = "query_timeout_ms";
pub const KEY_READER_POOL_SIZE: &str = "reader_pool_size";

pub const KNOWN_KEYS: &[&str] = &[
    KEY_PAY_RATE,
    KEY_SALE_UNIT_PRICE,
    KEY_PAY_WEEKDAY,
    KEY_PAY_TIME,
    KEY_QUERY_TIMEOUT_MS,
    KEY_READER_POOL_SIZE,
];

/// Price of one brick on a sale.
pub const DEFAULT_SALE_UNIT_PRICE: f64 = 1600.0;

const MAX_READER_POOL: usize = 32;

/// Runtime settings persisted in the `app_config` table.
///
/// Every key has a default, so an empty table is a valid configuration.
/// Values are validated when written through [`Settings::check_entry`] and
/// again when loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub pay_rate: f64,
    pub sale_unit_price: f64,
    pub pay_trigger: WeeklyTrigger,
    pub query_timeout: Duration,
    pub reader_pool_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pay_rate: DEFAULT_PAY_RATE,
            sale_unit_price: DEFAULT_SALE_UNIT_PRICE,
            pay_trigger: WeeklyTrigger::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            reader_pool_size: DEFAULT_READER_POOL,
        }
    }
}

impl Settings {
    /// Load settings from the database, falling back to defaults for unset keys.
    pub async fn load(db: &Database) -> Result<Self> {
        let entries = db
            .read(|conn| Ok(repository::list_config(conn)?))
            .await?;
        Self::from_entries(&entries)
    }

    /// Build settings from stored key/value pairs. Unknown keys are ignored.
    pub fn from_entries(entries: &[(String, String)]) -> Result<Self> {
        let mut settings = Self::default();
        let mut weekday = None;
        let mut time = None;

        for (key, value) in entries {
            match key.as_str() {
                KEY_PAY_RATE => settings.pay_rate = parse_positive(key, value)?,
                KEY_SALE_UNIT_PRICE => settings.sale_unit_price = parse_positive(key, value)?,
                KEY_PAY_WEEKDAY => weekday = Some(value.as_str()),
                KEY_PAY_TIME => time = Some(value.as_str()),
                KEY_QUERY_TIMEOUT_MS => {
                    let ms: u64 = value.trim().parse().map_err(|_| invalid(key, value))?;
                    if ms == 0 {
                        return Err(invalid(key, value));
                    }
                    settings.query_timeout = Duration::from_millis(ms);
                }
                KEY_READER_POOL_SIZE => {
                    let n: usize = value.trim().parse().map_err(|_| invalid(key, value))?;
                    if n == 0 || n > MAX_READER_POOL {
                        return Err(invalid(key, value));
                    }
                    settings.reader_pool_size = n;
                }
                _ => log::debug!("Ignoring unrelated config key '{key}'"),
            }
        }

        if weekday.is_some() || time.is_some() {
            let default = WeeklyTrigger::default();
            let default_weekday = default.weekday.to_string();
            let default_time = default.time.format("%H:%M").to_string();
            settings.pay_trigger = WeeklyTrigger::parse(
                weekday.unwrap_or(&default_weekday),
                time.unwrap_or(&default_time),
            )
            .map_err(|e| Error::Config(e.to_string()))?;
        }

        Ok(settings)
    }

    /// Check that `value` is acceptable for `key` before it is stored.
    pub fn check_entry(key: &str, value: &str) -> Result<()> {
        if !KNOWN_KEYS.contains(&key) {
            return Err(Error::Config(format!(
                "unknown key '{key}' (known: {})",
                KNOWN_KEYS.join(", ")
            )));
        }
        Self::from_entries(&[(key.to_string(), value.to_string())]).map(|_| ())
    }

    /// Current values of every known key, for display.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_PAY_RATE, self.pay_rate.to_string()),
            (KEY_SALE_UNIT_PRICE, self.sale_unit_price.to_string()),
            (KEY_PAY_WEEKDAY, self.pay_trigger.weekday.to_string()),
            (KEY_PAY_TIME, self.pay_trigger.time.format("%H:%M").to_string()),
            (
                KEY_QUERY_TIMEOUT_MS,
                self.query_timeout.as_millis().to_string(),
            ),
            (KEY_READER_POOL_SIZE, self.reader_pool_size.to_string()),
        ]
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::Config(format!("invalid value '{value}' for {key}"))
}

fn parse_positive(key: &str, value: &str) -> Result<f64> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(invalid(key, value)),
    }
}
