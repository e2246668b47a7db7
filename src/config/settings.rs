use std::time::Duration;

use config::{Config, Environment};
use serde::{Deserialize, Serialize};

use crate::{error::SettingsError, logging::LoggingConfig};

/// Количество воркеров доставки по умолчанию.
pub const DEFAULT_WORKERS: usize = 100;
/// Ёмкость очереди задач доставки по умолчанию.
pub const DEFAULT_BUFFER: usize = 10_000;
/// Таймаут `close` по умолчанию, мс.
pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 5_000;
/// Префикс переменных окружения.
pub const ENV_PREFIX: &str = "MEMBUS";

/// Настройки брокера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// Количество воркеров пула доставки
    pub workers: usize,
    /// Ёмкость ограниченной очереди задач
    pub buffer: usize,
    /// Сколько `close` ждёт опустошения очереди
    pub close_timeout_ms: u64,
}

/// Настройки процесса: брокер и логирование.
///
/// Загружаются из значений по умолчанию и переменных окружения с префиксом
/// `MEMBUS_`, вложенные ключи разделяются `__`:
/// `MEMBUS_BROKER__WORKERS=8`, `MEMBUS_LOGGING__FORMAT=json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub logging: LoggingConfig,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            buffer: DEFAULT_BUFFER,
            close_timeout_ms: DEFAULT_CLOSE_TIMEOUT_MS,
        }
    }
}

impl BrokerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Переопределяет количество воркеров и ёмкость очереди.
    pub fn worker(
        mut self,
        workers: usize,
        buffer: usize,
    ) -> Self {
        self.workers = workers;
        self.buffer = buffer;
        self
    }

    pub fn with_close_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.close_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.workers == 0 {
            return Err(SettingsError::Invalid {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.buffer == 0 {
            return Err(SettingsError::Invalid {
                field: "buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Settings {
    /// Загружает настройки из окружения с префиксом `MEMBUS`.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_with_prefix(ENV_PREFIX)
    }

    pub fn load_with_prefix(prefix: &str) -> Result<Self, SettingsError> {
        let defaults = BrokerSettings::default();
        let cfg = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("broker.workers", defaults.workers as u64)?
            .set_default("broker.buffer", defaults.buffer as u64)?
            .set_default("broker.close_timeout_ms", defaults.close_timeout_ms)?
            // Переменные окружения: PREFIX_SECTION__KEY
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.broker.validate()?;
        self.logging
            .validate()
            .map_err(|err| SettingsError::Invalid {
                field: "logging",
                reason: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use serial_test::serial;

    use super::*;
    use crate::logging::LogFormat;

    const TEST_PREFIX: &str = "MEMBUS_SETTINGS_TEST";

    fn clear_env() {
        for key in [
            "MEMBUS_SETTINGS_TEST_BROKER__WORKERS",
            "MEMBUS_SETTINGS_TEST_BROKER__BUFFER",
            "MEMBUS_SETTINGS_TEST_BROKER__CLOSE_TIMEOUT_MS",
            "MEMBUS_SETTINGS_TEST_LOGGING__FORMAT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_broker_settings_default() {
        let s = BrokerSettings::default();
        assert_eq!(s.workers, 100);
        assert_eq!(s.buffer, 10_000);
        assert_eq!(s.close_timeout(), Duration::from_secs(5));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_broker_settings_builders() {
        let s = BrokerSettings::new()
            .worker(4, 64)
            .with_close_timeout(Duration::from_millis(250));
        assert_eq!(s.workers, 4);
        assert_eq!(s.buffer, 64);
        assert_eq!(s.close_timeout_ms, 250);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let err = BrokerSettings::new().worker(0, 10).validate().unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "workers", .. }));

        let err = BrokerSettings::new().worker(1, 0).validate().unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "buffer", .. }));
    }

    /// Тест проверяет, что без переменных окружения загружаются значения
    /// по умолчанию.
    #[test]
    #[serial]
    fn test_load_defaults() {
        clear_env();
        let s = Settings::load_with_prefix(TEST_PREFIX).unwrap();
        assert_eq!(s.broker, BrokerSettings::default());
        assert_eq!(s.logging.format, LogFormat::default());
    }

    /// Тест проверяет переопределение через переменные окружения.
    #[test]
    #[serial]
    fn test_load_env_overrides() {
        clear_env();
        env::set_var("MEMBUS_SETTINGS_TEST_BROKER__WORKERS", "8");
        env::set_var("MEMBUS_SETTINGS_TEST_BROKER__BUFFER", "256");
        env::set_var("MEMBUS_SETTINGS_TEST_LOGGING__FORMAT", "json");

        let s = Settings::load_with_prefix(TEST_PREFIX).unwrap();
        clear_env();

        assert_eq!(s.broker.workers, 8);
        assert_eq!(s.broker.buffer, 256);
        assert_eq!(s.broker.close_timeout_ms, DEFAULT_CLOSE_TIMEOUT_MS);
        assert_eq!(s.logging.format, LogFormat::Json);
    }

    /// Тест проверяет, что невалидное значение из окружения отклоняется.
    #[test]
    #[serial]
    fn test_load_rejects_zero_workers() {
        clear_env();
        env::set_var("MEMBUS_SETTINGS_TEST_BROKER__WORKERS", "0");
        let res = Settings::load_with_prefix(TEST_PREFIX);
        clear_env();

        assert!(matches!(
            res,
            Err(SettingsError::Invalid {
                field: "workers",
                ..
            })
        ));
    }
}
