/// Параметры публикации.
///
/// Сейчас ни один параметр не меняет поведение in-memory брокера; тип
/// нужен для совместимости с сетевыми реализациями `PubSubPort`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishOptions {}

/// Параметры подписки.
///
/// - `auto_ack`: если `true` (по умолчанию), событие подтверждается после
///   успешного возврата обработчика.
/// - `queue`: подписчики с одинаковым непустым именем очереди делят
///   сообщения топика между собой; пустая строка означает broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub auto_ack: bool,
    pub queue: String,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            auto_ack: true,
            queue: String::new(),
        }
    }
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Включает подписчика в группу конкурирующих потребителей.
    pub fn with_queue(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.queue = name.into();
        self
    }

    /// Отключает автоматическое подтверждение.
    pub fn disable_auto_ack(mut self) -> Self {
        self.auto_ack = false;
        self
    }

    /// `true`, если подписчик получает каждое сообщение топика.
    pub fn is_broadcast(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Сокращение для `SubscribeOptions::new().with_queue(name)`.
pub fn queue(name: impl Into<String>) -> SubscribeOptions {
    SubscribeOptions::new().with_queue(name)
}

/// Сокращение для `SubscribeOptions::new().disable_auto_ack()`.
pub fn disable_auto_ack() -> SubscribeOptions {
    SubscribeOptions::new().disable_auto_ack()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_options_default() {
        let opts = SubscribeOptions::default();
        assert!(opts.auto_ack);
        assert!(opts.queue.is_empty());
        assert!(opts.is_broadcast());
    }

    #[test]
    fn test_subscribe_options_builders() {
        let opts = queue("q1").disable_auto_ack();
        assert_eq!(opts.queue, "q1");
        assert!(!opts.auto_ack);
        assert!(!opts.is_broadcast());

        let opts = disable_auto_ack();
        assert!(!opts.auto_ack);
        assert!(opts.is_broadcast());
    }
}
