use std::{fmt, sync::Arc, time::Duration};

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use tokio::sync::Mutex as AsyncMutex;

use super::{
    BrokerStats, BrokerStatsSnapshot, DispatchPool, Event, Handler, PublishOptions,
    QueueSnapshot, Registry, SubscribeOptions, SubscriberEntry, Subscription, Task,
};
use crate::{
    config::BrokerSettings,
    error::{BrokerError, BrokerResult},
};

/// Состояние соединения брокера.
///
/// Переходы только вперёд: `Created → Open → Closed`. Закрытый брокер
/// повторно не открывается.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Created,
    Open,
    Closed,
}

/// Внутрипроцессный брокер сообщений типа `T`.
///
/// Поддерживает:
/// - Broadcast-подписчиков: каждый получает каждое сообщение топика
/// - Группы очередей: сообщение получает один случайный живой участник
///   каждой группы
/// - Ограниченный пул воркеров с backpressure на стороне `publish`
/// - Идемпотентную отписку и `close` с ожиданием опустошения очереди
///
/// Брокер сам не стартует: до [`open`](Self::open) и после
/// [`close`](Self::close) `publish` и `subscribe` возвращают
/// [`BrokerError::InvalidConnectionState`].
pub struct MemoryBroker<T> {
    settings: BrokerSettings,
    /// `subscribe` держит чтение на время вставки, смена состояния берёт
    /// запись
    state: RwLock<ConnectionState>,
    /// Сериализует `open` и `close`
    lifecycle: AsyncMutex<()>,
    registry: Arc<Registry<T>>,
    pool: DispatchPool,
    stats: Arc<BrokerStats>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T> MemoryBroker<T>
where
    T: Send + Sync + 'static,
{
    /// Создаёт брокер с настройками по умолчанию (100 воркеров, очередь на
    /// 10 000 задач, таймаут закрытия 5 с).
    pub fn new() -> Self {
        Self::with_settings(BrokerSettings::default())
    }

    pub fn with_settings(settings: BrokerSettings) -> Self {
        let stats = Arc::new(BrokerStats::new());
        let pool = DispatchPool::new(settings.workers, settings.buffer, stats.clone());
        Self {
            settings,
            state: RwLock::new(ConnectionState::Created),
            lifecycle: AsyncMutex::new(()),
            registry: Arc::new(Registry::new()),
            pool,
            stats,
        }
    }

    /// Запускает пул доставки.
    ///
    /// Возвращается, когда все воркеры готовы. Повторный вызов на открытом
    /// брокере ничего не делает. Закрытый брокер открыть нельзя.
    pub async fn open(&self) -> BrokerResult<()> {
        let _guard = self.lifecycle.lock().await;
        match self.state() {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed => Err(BrokerError::InvalidConnectionState),
            ConnectionState::Created => {
                self.pool.start().await?;
                self.set_state(ConnectionState::Open);
                tracing::info!(
                    workers = self.pool.worker_count(),
                    buffer = self.pool.buffer(),
                    "Broker opened"
                );
                Ok(())
            }
        }
    }

    /// Публикует сообщение в топик с параметрами по умолчанию.
    pub async fn publish(
        &self,
        topic: &str,
        message: impl Into<Arc<T>>,
    ) -> BrokerResult<()> {
        self.publish_with(topic, message, PublishOptions::default())
            .await
    }

    /// Публикует сообщение в топик.
    ///
    /// Каждый живой broadcast-подписчик получает задачу доставки; в каждой
    /// группе очереди задачу получает один случайно выбранный живой
    /// участник. Метод возвращается, когда все задачи переданы в пул, и
    /// может ждать, если очередь заполнена. Выполнения обработчиков он не
    /// ждёт, их ошибки издателю не возвращаются.
    pub async fn publish_with(
        &self,
        topic: &str,
        message: impl Into<Arc<T>>,
        _options: PublishOptions,
    ) -> BrokerResult<()> {
        self.ensure_open()?;
        // Отправитель держим до конца публикации: `close` дождётся, пока
        // все её задачи окажутся в канале.
        let tx = self.pool.sender()?;

        let groups = self.registry.snapshot(topic);
        self.stats.record_publish();
        if groups.is_empty() {
            tracing::trace!(topic, "Publish without subscribers");
            return Ok(());
        }

        let event = Event::with_topic(self.registry.topic_key(topic), message.into());
        let targets = select_targets(groups);
        tracing::trace!(topic, targets = targets.len(), "Publishing");

        for entry in targets {
            let task = delivery_task(entry, event.clone(), self.stats.clone());
            tx.send(task)
                .await
                .map_err(|_| BrokerError::InvalidConnectionState)?;
            self.stats.record_delivery();
        }
        Ok(())
    }

    /// Подписывает broadcast-обработчик на топик.
    pub fn subscribe<H>(
        &self,
        topic: &str,
        handler: H,
    ) -> BrokerResult<Subscription>
    where
        H: Handler<T>,
    {
        self.subscribe_with(topic, handler, SubscribeOptions::default())
    }

    /// Подписывает обработчик на топик с параметрами.
    ///
    /// Непустой `options.queue` включает подписчика в группу
    /// конкурирующих потребителей.
    ///
    /// Проверка состояния и вставка в реестр атомарны относительно
    /// `close`: подписка либо отклоняется и никогда не получает доставок,
    /// либо успешно создаётся и затем снимается при закрытии.
    pub fn subscribe_with<H>(
        &self,
        topic: &str,
        handler: H,
        options: SubscribeOptions,
    ) -> BrokerResult<Subscription>
    where
        H: Handler<T>,
    {
        self.subscribe_arc(topic, Arc::new(handler), options)
    }

    pub(crate) fn subscribe_arc(
        &self,
        topic: &str,
        handler: Arc<dyn Handler<T>>,
        options: SubscribeOptions,
    ) -> BrokerResult<Subscription> {
        let state = self.state.read();
        if *state != ConnectionState::Open {
            return Err(BrokerError::InvalidConnectionState);
        }

        let entry = Arc::new(SubscriberEntry::new(
            self.registry.topic_key(topic),
            options,
            handler,
        ));
        let subscription = entry.subscription(deregister_callback(&self.registry, &entry));
        self.registry.insert(entry.clone());
        drop(state);

        tracing::debug!(
            topic,
            queue = entry.queue(),
            subscriber = %entry.id(),
            "Subscribed"
        );
        Ok(subscription)
    }

    /// Закрывает брокер с таймаутом из настроек.
    pub async fn close(&self) -> BrokerResult<()> {
        self.close_with_timeout(self.settings.close_timeout())
            .await
    }

    /// Закрывает брокер.
    ///
    /// Порядок:
    /// 1. Новые `publish`/`subscribe` начинают получать ошибку состояния;
    ///    `subscribe`, уже прошедший проверку, успевает вставить запись.
    /// 2. Пул перестаёт принимать задачи; ждём, пока воркеры выполнят всё
    ///    уже поставленное, не дольше `timeout`.
    /// 3. Все оставшиеся подписки отписываются.
    ///
    /// При истечении таймаута шаг 3 всё равно выполняется, оставшиеся
    /// задачи дорабатывают в фоне, а вызывающий получает
    /// [`BrokerError::CloseTimeout`].
    pub async fn close_with_timeout(
        &self,
        timeout: Duration,
    ) -> BrokerResult<()> {
        let _guard = self.lifecycle.lock().await;
        if self.state() == ConnectionState::Closed {
            return Ok(());
        }
        self.set_state(ConnectionState::Closed);

        let drained = tokio::time::timeout(timeout, self.pool.stop()).await;
        let swept = self.sweep();

        match drained {
            Ok(result) => {
                tracing::info!(unsubscribed = swept, "Broker closed");
                result
            }
            Err(_) => {
                let timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
                tracing::warn!(
                    timeout_ms,
                    in_flight = self.stats.snapshot().in_flight(),
                    "Broker closed before delivery queue drained"
                );
                Err(BrokerError::CloseTimeout { timeout_ms })
            }
        }
    }

    /// `Ok(())`, если брокер открыт. Побочных эффектов нет.
    pub fn check_health(&self) -> BrokerResult<()> {
        self.ensure_open()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Количество подписчиков топика во всех группах.
    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.registry.subscriber_count(topic)
    }

    /// Количество топиков с хотя бы одним подписчиком.
    pub fn topic_count(&self) -> usize {
        self.registry.topic_count()
    }

    pub fn stats(&self) -> BrokerStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BrokerError::InvalidConnectionState)
        }
    }

    fn set_state(
        &self,
        state: ConnectionState,
    ) {
        *self.state.write() = state;
    }

    /// Снимает и деактивирует все подписки. Возвращает их количество.
    fn sweep(&self) -> usize {
        let entries = self.registry.drain();
        for entry in &entries {
            entry.deactivate();
        }
        entries.len()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Доставка
////////////////////////////////////////////////////////////////////////////////

/// Выбирает получателей по снимку реестра.
///
/// Синхронная функция: `ThreadRng` не должен пересекать `.await`.
fn select_targets<T>(groups: Vec<QueueSnapshot<T>>) -> Vec<Arc<SubscriberEntry<T>>> {
    let mut rng = rand::thread_rng();
    let mut targets = Vec::new();
    for group in groups {
        if group.queue.is_empty() {
            targets.extend(group.members);
        } else if let Some(member) = group.members.choose(&mut rng) {
            targets.push(member.clone());
        }
    }
    targets
}

fn delivery_task<T>(
    entry: Arc<SubscriberEntry<T>>,
    event: Event<T>,
    stats: Arc<BrokerStats>,
) -> Task
where
    T: Send + Sync + 'static,
{
    Box::pin(async move {
        match entry.handler().handle(event.clone()).await {
            Ok(()) => {
                if entry.options().auto_ack {
                    if let Err(err) = event.ack() {
                        tracing::debug!(
                            topic = event.topic(),
                            subscriber = %entry.id(),
                            error = %err,
                            "Ack failed"
                        );
                    }
                }
            }
            Err(err) => {
                stats.record_handler_error();
                tracing::debug!(
                    topic = event.topic(),
                    subscriber = %entry.id(),
                    error = %err,
                    "Handler returned error"
                );
            }
        }
    })
}

/// Колбэк отписки: удаляет ровно эту запись из её корзины.
///
/// Держит `Weak`, чтобы подписка не продлевала жизнь реестра.
fn deregister_callback<T>(
    registry: &Arc<Registry<T>>,
    entry: &SubscriberEntry<T>,
) -> impl Fn() + Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    let registry = Arc::downgrade(registry);
    let topic = entry.topic().clone();
    let queue = entry.queue().to_string();
    let id = entry.id();
    move || {
        let Some(registry) = registry.upgrade() else {
            return;
        };
        if registry.remove(&topic, &queue, id).is_some() {
            tracing::debug!(topic = %topic, queue = %queue, subscriber = %id, "Unsubscribed");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<T> Default for MemoryBroker<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemoryBroker<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("state", &self.state())
            .field("settings", &self.settings)
            .field("workers", &self.pool.spawned())
            .field("topics", &self.registry.topic_count())
            .field("subscribers", &self.registry.len())
            .finish()
    }
}
