use std::{collections::BTreeMap, env, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::LoggingError;

/// Формат вывода логов.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Многострочный человекочитаемый вывод (для разработки)
    #[default]
    Pretty,
    /// Одна JSON-запись на событие
    Json,
    /// Однострочный вывод
    Compact,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень по умолчанию (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    pub format: LogFormat,
    /// Переопределения уровня по модулям: `membus::pubsub = "trace"`
    pub modules: BTreeMap<String, String>,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            modules: BTreeMap::new(),
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
            with_ansi: true,
        }
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

impl LoggingConfig {
    /// Применяет `MEMBUS_LOG_LEVEL` и `MEMBUS_LOG_FORMAT`, если заданы.
    ///
    /// Неизвестный формат игнорируется с предупреждением в stderr: подписчик
    /// tracing ещё не установлен.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("MEMBUS_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.level = level.trim().to_string();
            }
        }
        if let Ok(format) = env::var("MEMBUS_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => eprintln!("Ignoring MEMBUS_LOG_FORMAT: {e}"),
            }
        }
    }

    /// Собирает директиву `EnvFilter`: базовый уровень и переопределения
    /// модулей через запятую.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![self.level.clone()];
        parts.extend(
            self.modules
                .iter()
                .map(|(module, level)| format!("{module}={level}")),
        );
        parts.join(",")
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        let directive = self.build_filter_directive();
        EnvFilter::try_new(&directive)
            .map(|_| ())
            .map_err(|e| LoggingError::InvalidDirective {
                directive,
                reason: e.to_string(),
            })
    }
}
