use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use uuid::Uuid;

use super::{Handler, SubscribeOptions};
use crate::error::BrokerResult;

/// Уникальный идентификатор подписчика.
pub type SubscriberId = Uuid;

type Deregister = Arc<dyn Fn() + Send + Sync>;

/// Запись подписчика в реестре.
///
/// Разделяет флаг активности с [`Subscription`], выданной вызывающему:
/// как только флаг сброшен, запись больше не выбирается для новых
/// доставок.
pub struct SubscriberEntry<T> {
    id: SubscriberId,
    topic: Arc<str>,
    options: SubscribeOptions,
    handler: Arc<dyn Handler<T>>,
    active: Arc<AtomicBool>,
}

/// Подписка, возвращаемая вызывающему.
///
/// `unsubscribe` можно вызывать из любого потока и сколько угодно раз:
/// эффект имеет только первый вызов. Drop подписки **не** отписывает.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriberId,
    topic: Arc<str>,
    queue: Arc<str>,
    active: Arc<AtomicBool>,
    deregister: Deregister,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T> SubscriberEntry<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(
        topic: Arc<str>,
        options: SubscribeOptions,
        handler: Arc<dyn Handler<T>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            options,
            handler,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> &Arc<str> {
        &self.topic
    }

    pub fn queue(&self) -> &str {
        &self.options.queue
    }

    pub fn options(&self) -> &SubscribeOptions {
        &self.options
    }

    pub fn handler(&self) -> &Arc<dyn Handler<T>> {
        &self.handler
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Сбрасывает флаг активности.
    ///
    /// Возвращает `true`, если флаг был сброшен именно этим вызовом.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    /// Создаёт подписку для вызывающего, разделяющую флаг активности
    /// с этой записью.
    pub fn subscription<F>(
        &self,
        deregister: F,
    ) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        Subscription {
            id: self.id,
            topic: self.topic.clone(),
            queue: Arc::from(self.options.queue.as_str()),
            active: self.active.clone(),
            deregister: Arc::new(deregister),
        }
    }
}

impl Subscription {
    /// Создаёт подписку с произвольным колбэком отписки.
    ///
    /// Используется транспортными адаптерами, которые не хранят подписчиков
    /// в [`Registry`](super::Registry).
    pub fn new<F>(
        topic: impl AsRef<str>,
        queue: impl AsRef<str>,
        deregister: F,
    ) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            topic: Arc::from(topic.as_ref()),
            queue: Arc::from(queue.as_ref()),
            active: Arc::new(AtomicBool::new(true)),
            deregister: Arc::new(deregister),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Возвращает имя топика подписки.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Имя группы; пустая строка для broadcast-подписчика.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Отписывается от топика.
    ///
    /// Повторные вызовы ничего не делают и возвращают `Ok(())`.
    pub fn unsubscribe(&self) -> BrokerResult<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        (self.deregister)();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("queue", &self.queue)
            .field("active", &self.is_active())
            .finish()
    }
}

impl<T> fmt::Debug for SubscriberEntry<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("options", &self.options)
            .field("active", &self.active.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::{pubsub::Event, HandlerResult};

    fn noop_entry(queue: &str) -> SubscriberEntry<u8> {
        let handler = |_ev: Event<u8>| async move { HandlerResult::Ok(()) };
        SubscriberEntry::new(
            Arc::from("topic"),
            SubscribeOptions::new().with_queue(queue),
            Arc::new(handler),
        )
    }

    /// Тест проверяет, что повторная отписка не вызывает колбэк второй раз.
    #[test]
    fn test_unsubscribe_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let sub = Subscription::new("topic", "", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        sub.unsubscribe().unwrap();
        sub.unsubscribe().unwrap();
        sub.clone().unsubscribe().unwrap();

        assert!(!sub.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Тест проверяет, что подписка и запись разделяют флаг активности.
    #[test]
    fn test_subscription_shares_liveness_with_entry() {
        let entry = noop_entry("q1");
        let sub = entry.subscription(|| {});

        assert_eq!(sub.id(), entry.id());
        assert_eq!(sub.topic(), "topic");
        assert_eq!(sub.queue(), "q1");

        sub.unsubscribe().unwrap();
        assert!(!entry.is_active());
    }

    /// Тест проверяет, что после `deactivate` со стороны реестра
    /// отписка через handle не вызывает колбэк.
    #[test]
    fn test_deactivated_entry_skips_deregister() {
        let entry = noop_entry("");
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let sub = entry.subscription(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(entry.deactivate());
        assert!(!entry.deactivate());
        sub.unsubscribe().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Тест проверяет конкурентную отписку из нескольких потоков.
    #[test]
    fn test_concurrent_unsubscribe() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let sub = Subscription::new("race", "", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = sub.clone();
                std::thread::spawn(move || s.unsubscribe())
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
