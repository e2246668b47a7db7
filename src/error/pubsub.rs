use std::error::Error as StdError;

use thiserror::Error;

/// Ошибка, которую вернул обработчик подписки.
///
/// До публикующей стороны такие ошибки не доходят: воркер только
/// учитывает их в статистике и пишет в лог.
pub type HandlerError = Box<dyn StdError + Send + Sync + 'static>;

/// Результат выполнения обработчика.
pub type HandlerResult = Result<(), HandlerError>;

/// Результат операций брокера.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Ошибки брокера сообщений.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Операция вызвана до `open` или после `close`.
    #[error("invalid connection state")]
    InvalidConnectionState,

    #[error("broker did not drain within {timeout_ms} ms")]
    CloseTimeout { timeout_ms: u64 },

    /// Брокер по умолчанию для этого типа сообщений уже установлен.
    #[error("default broker for `{type_name}` is already initialized")]
    AlreadyInitialized { type_name: &'static str },

    #[error("dispatch worker terminated abnormally: {0}")]
    WorkerPanicked(String),
}
