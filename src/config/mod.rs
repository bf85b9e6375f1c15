use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub booking: BookingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    /// `pretty` или `json`
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: "development".to_string(),
            rust_log: "showtime_booking=debug,tower_http=debug".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Ключ проверки токенов identity-провайдера
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

// Политика удержания мест
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub max_seats_per_booking: usize,
    pub hold_ttl_seconds: u64,
    pub max_hold_ttl_seconds: u64,
    pub filling_fast_threshold: f64,
    pub hold_sweep_interval_seconds: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_seats_per_booking: 10,
            hold_ttl_seconds: 300,
            max_hold_ttl_seconds: 1800,
            filling_fast_threshold: 0.10,
            hold_sweep_interval_seconds: 5,
        }
    }
}

impl BookingConfig {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            max_seats_per_booking: self.max_seats_per_booking,
            default_hold_ttl: Duration::from_secs(self.hold_ttl_seconds),
            max_hold_ttl: Duration::from_secs(self.max_hold_ttl_seconds),
            filling_fast_threshold: self.filling_fast_threshold,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.hold_sweep_interval_seconds.max(1))
    }
}

/// Policy knobs consumed by the engine itself.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_seats_per_booking: usize,
    pub default_hold_ttl: Duration,
    pub max_hold_ttl: Duration,
    pub filling_fast_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        BookingConfig::default().engine()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = or_default(key, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let booking = BookingConfig {
            max_seats_per_booking: parsed("MAX_SEATS_PER_BOOKING", "10")?,
            hold_ttl_seconds: parsed("HOLD_TTL_SECONDS", "300")?,
            max_hold_ttl_seconds: parsed("MAX_HOLD_TTL_SECONDS", "1800")?,
            filling_fast_threshold: parsed("FILLING_FAST_THRESHOLD", "0.10")?,
            hold_sweep_interval_seconds: parsed("HOLD_SWEEP_INTERVAL_SECONDS", "5")?,
        };
        booking.validate()?;

        Ok(Config {
            app: AppConfig {
                host: or_default("HOST", "0.0.0.0"),
                port: parsed("PORT", "8000")?,
                environment: or_default("ENVIRONMENT", "development"),
                rust_log: or_default("RUST_LOG", "showtime_booking=debug,tower_http=debug"),
                log_format: or_default("LOG_FORMAT", "pretty"),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parsed("DB_POOL_SIZE", "20")?,
            },
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
            },
            booking,
        })
    }
}

// Бронь дольше суток не имеет смысла.
const MAX_HOLD_TTL_CAP_SECONDS: u64 = 24 * 60 * 60;

impl BookingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_seats_per_booking == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_SEATS_PER_BOOKING",
                value: self.max_seats_per_booking.to_string(),
            });
        }
        if self.max_hold_ttl_seconds == 0 || self.max_hold_ttl_seconds > MAX_HOLD_TTL_CAP_SECONDS {
            return Err(ConfigError::Invalid {
                key: "MAX_HOLD_TTL_SECONDS",
                value: self.max_hold_ttl_seconds.to_string(),
            });
        }
        if self.hold_ttl_seconds == 0 || self.hold_ttl_seconds > self.max_hold_ttl_seconds {
            return Err(ConfigError::Invalid {
                key: "HOLD_TTL_SECONDS",
                value: self.hold_ttl_seconds.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.filling_fast_threshold) {
            return Err(ConfigError::Invalid {
                key: "FILLING_FAST_THRESHOLD",
                value: self.filling_fast_threshold.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(BookingConfig::default().validate().is_ok());
        let engine = EngineConfig::default();
        assert_eq!(engine.max_seats_per_booking, 10);
        assert_eq!(engine.default_hold_ttl, Duration::from_secs(300));
        assert_eq!(engine.filling_fast_threshold, 0.10);
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let booking = BookingConfig { filling_fast_threshold: 1.5, ..BookingConfig::default() };
        assert!(matches!(
            booking.validate(),
            Err(ConfigError::Invalid { key: "FILLING_FAST_THRESHOLD", .. })
        ));
    }

    #[test]
    fn ttl_above_cap_is_rejected() {
        let booking = BookingConfig {
            hold_ttl_seconds: 4000,
            ..BookingConfig::default()
        };
        assert!(booking.validate().is_err());
    }

    #[test]
    fn max_ttl_is_capped_at_one_day() {
        let booking = BookingConfig {
            max_hold_ttl_seconds: u64::MAX,
            ..BookingConfig::default()
        };
        assert!(matches!(
            booking.validate(),
            Err(ConfigError::Invalid { key: "MAX_HOLD_TTL_SECONDS", .. })
        ));

        let booking = BookingConfig {
            max_hold_ttl_seconds: 86_400,
            ..BookingConfig::default()
        };
        assert!(booking.validate().is_ok());
    }
}
