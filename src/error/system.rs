use thiserror::Error;

/// Ошибки загрузки и проверки настроек.
#[derive(Error, Debug)]
pub enum SettingsError {
    // ==== Источник конфигурации ====
    #[error("Configuration load error: {0}")]
    Load(#[from] config::ConfigError),

    // ==== Валидация ====
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Ошибки инициализации логирования.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    #[error("Invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Unknown log format: {0}")]
    UnknownFormat(String),

    #[error("Global tracing subscriber is already installed")]
    AlreadyInitialized,
}
