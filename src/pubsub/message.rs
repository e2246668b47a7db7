use std::{error::Error as StdError, fmt, sync::Arc};

use crate::error::BrokerResult;

/// Код причины для событий с ошибкой.
///
/// In-memory брокер сам таких событий не создаёт: их порождают
/// транспортные адаптеры, когда не удалось декодировать сообщение или
/// оформить подписку.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    #[default]
    None,
    /// Не удалось десериализовать сообщение.
    UnmarshalFailure,
    /// Не удалось установить подписку.
    SubscriptionFailure,
}

/// Одна доставка сообщения обработчику.
///
/// Событие неизменяемо после создания. Клонирование дешёвое: топик,
/// полезная нагрузка и ошибка разделяются через `Arc`.
///
/// Инвариант: если ошибки нет, полезная нагрузка присутствует.
pub struct Event<T> {
    topic: Arc<str>,
    message: Option<Arc<T>>,
    error: Option<Arc<dyn StdError + Send + Sync>>,
    reason: Reason,
}

impl<T> Event<T> {
    /// Создаёт успешное событие с полезной нагрузкой.
    pub fn new(
        topic: impl AsRef<str>,
        message: Arc<T>,
    ) -> Self {
        Self::with_topic(Arc::from(topic.as_ref()), message)
    }

    /// Событие с уже разделяемым именем топика (ключ корзины реестра).
    pub(crate) fn with_topic(
        topic: Arc<str>,
        message: Arc<T>,
    ) -> Self {
        Self {
            topic,
            message: Some(message),
            error: None,
            reason: Reason::None,
        }
    }

    /// Создаёт событие-ошибку без полезной нагрузки.
    pub fn failed<E>(
        topic: impl AsRef<str>,
        error: E,
        reason: Reason,
    ) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            topic: Arc::from(topic.as_ref()),
            message: None,
            error: Some(Arc::new(error)),
            reason,
        }
    }

    /// Имя топика события.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Имя топика как `Arc<str>`; у событий одной публикации оно общее с
    /// ключом реестра.
    pub fn topic_arc(&self) -> &Arc<str> {
        &self.topic
    }

    /// Ссылка на полезную нагрузку.
    pub fn message(&self) -> Option<&T> {
        self.message.as_deref()
    }

    /// Разделяемый указатель на полезную нагрузку.
    pub fn payload(&self) -> Option<Arc<T>> {
        self.message.clone()
    }

    /// Подтверждение обработки. Для in-memory брокера ничего не делает.
    pub fn ack(&self) -> BrokerResult<()> {
        Ok(())
    }

    pub fn error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.error.as_deref()
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    /// `true`, если событие несёт ошибку вместо сообщения.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            message: self.message.clone(),
            error: self.error.clone(),
            reason: self.reason,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Event<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Event")
            .field("topic", &self.topic)
            .field("message", &self.message)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .field("reason", &self.reason)
            .finish()
    }
}
