//! Интерфейс (порт) брокера сообщений.
//!
//! Вызывающий код зависит от трейта, а не от конкретного брокера:
//! - `open` — подготовить брокер к работе.
//! - `publish` — опубликовать сообщение в топик.
//! - `subscribe` — подписать обработчик на топик.
//! - `close` — дождаться доставки и снять все подписки.
//!
//! In-memory реализация — [`MemoryBroker`]; сетевые адаптеры реализуют тот
//! же трейт.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::BrokerResult,
    pubsub::{Handler, MemoryBroker, PublishOptions, SubscribeOptions, Subscription},
};

#[async_trait]
pub trait PubSubPort<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Подготовить брокер к приёму публикаций и подписок.
    async fn open(&self) -> BrokerResult<()>;

    /// Опубликовать сообщение в топик.
    async fn publish(
        &self,
        topic: &str,
        message: Arc<T>,
        options: PublishOptions,
    ) -> BrokerResult<()>;

    /// Подписать обработчик на топик.
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn Handler<T>>,
        options: SubscribeOptions,
    ) -> BrokerResult<Subscription>;

    /// Закрыть брокер.
    async fn close(&self) -> BrokerResult<()>;
}

#[async_trait]
impl<T> PubSubPort<T> for MemoryBroker<T>
where
    T: Send + Sync + 'static,
{
    async fn open(&self) -> BrokerResult<()> {
        MemoryBroker::open(self).await
    }

    async fn publish(
        &self,
        topic: &str,
        message: Arc<T>,
        options: PublishOptions,
    ) -> BrokerResult<()> {
        self.publish_with(topic, message, options).await
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn Handler<T>>,
        options: SubscribeOptions,
    ) -> BrokerResult<Subscription> {
        self.subscribe_arc(topic, handler, options)
    }

    async fn close(&self) -> BrokerResult<()> {
        MemoryBroker::close(self).await
    }
}
