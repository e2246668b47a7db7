use std::sync::atomic::{AtomicU64, Ordering};

/// Счётчики брокера.
///
/// Все операции используют `Relaxed`: счётчики не участвуют в
/// синхронизации, только в статистике.
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Общее количество успешных вызовов `publish`
    published: AtomicU64,
    /// Задачи доставки, переданные в пул
    deliveries: AtomicU64,
    /// Задачи доставки, выполненные воркерами (включая ошибки и паники)
    completed: AtomicU64,
    /// Обработчики, вернувшие ошибку
    handler_errors: AtomicU64,
    /// Обработчики, завершившиеся паникой
    handler_panics: AtomicU64,
}

/// Снимок счётчиков на момент вызова [`BrokerStats::snapshot`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStatsSnapshot {
    pub published: u64,
    pub deliveries: u64,
    pub completed: u64,
    pub handler_errors: u64,
    pub handler_panics: u64,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BrokerStatsSnapshot {
        BrokerStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

impl BrokerStatsSnapshot {
    /// Задачи, которые переданы в пул, но ещё не выполнены.
    pub fn in_flight(&self) -> u64 {
        self.deliveries.saturating_sub(self.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = BrokerStats::new();
        stats.record_publish();
        stats.record_delivery();
        stats.record_delivery();
        stats.record_completed();
        stats.record_handler_error();

        let snap = stats.snapshot();
        assert_eq!(snap.published, 1);
        assert_eq!(snap.deliveries, 2);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.handler_errors, 1);
        assert_eq!(snap.handler_panics, 0);
        assert_eq!(snap.in_flight(), 1);
    }
}
