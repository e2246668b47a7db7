use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use super::{SubscriberEntry, SubscriberId};

type QueueMap<T> = HashMap<String, HashMap<SubscriberId, Arc<SubscriberEntry<T>>>>;

/// Живые участники одной группы на момент снимка.
///
/// Пустое имя очереди означает broadcast-группу.
pub struct QueueSnapshot<T> {
    pub queue: String,
    pub members: Vec<Arc<SubscriberEntry<T>>>,
}

/// Реестр подписок.
///
/// Индекс `topic → queue → id → подписчик` под одной блокировкой
/// чтения/записи. Блокировка охватывает только реестр: снимок копируется,
/// и постановка задач доставки идёт уже без неё.
pub struct Registry<T> {
    topics: RwLock<HashMap<Arc<str>, QueueMap<T>>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T> Registry<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Добавляет подписчика в корзину (topic, queue) записи.
    pub fn insert(
        &self,
        entry: Arc<SubscriberEntry<T>>,
    ) {
        let mut topics = self.topics.write();
        topics
            .entry(entry.topic().clone())
            .or_default()
            .entry(entry.queue().to_string())
            .or_default()
            .insert(entry.id(), entry);
    }

    /// Удаляет подписчика из корзины (topic, queue).
    ///
    /// Опустевшие корзины очереди и топика удаляются. Если подписчика нет —
    /// метод спокойно ничего не делает.
    pub fn remove(
        &self,
        topic: &str,
        queue: &str,
        id: SubscriberId,
    ) -> Option<Arc<SubscriberEntry<T>>> {
        let mut topics = self.topics.write();
        let queues = topics.get_mut(topic)?;
        let members = queues.get_mut(queue)?;
        let removed = members.remove(&id);

        if members.is_empty() {
            queues.remove(queue);
        }
        if queues.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    /// Копирует живых участников каждой группы топика.
    ///
    /// Неактивные записи отфильтровываются, пустые группы пропускаются.
    /// Broadcast-группа (если есть) идёт первой.
    pub fn snapshot(
        &self,
        topic: &str,
    ) -> Vec<QueueSnapshot<T>> {
        let topics = self.topics.read();
        let Some(queues) = topics.get(topic) else {
            return Vec::new();
        };

        let mut snapshot: Vec<QueueSnapshot<T>> = queues
            .iter()
            .filter_map(|(queue, members)| {
                let members: Vec<_> = members
                    .values()
                    .filter(|entry| entry.is_active())
                    .cloned()
                    .collect();
                (!members.is_empty()).then(|| QueueSnapshot {
                    queue: queue.clone(),
                    members,
                })
            })
            .collect();
        snapshot.sort_by_key(|q| !q.queue.is_empty());
        snapshot
    }

    /// Извлекает все записи, оставляя реестр пустым.
    pub fn drain(&self) -> Vec<Arc<SubscriberEntry<T>>> {
        let mut topics = self.topics.write();
        topics
            .drain()
            .flat_map(|(_, queues)| queues.into_values())
            .flat_map(|members| members.into_values())
            .collect()
    }

    /// Общее количество подписчиков.
    pub fn len(&self) -> usize {
        self.topics
            .read()
            .values()
            .flat_map(|queues| queues.values())
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }

    /// Количество топиков, у которых есть хотя бы один подписчик.
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Количество подписчиков топика во всех группах.
    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(|queues| queues.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    /// Ключ топика для новой записи или события.
    ///
    /// Пока у топика есть корзина, возвращается её ключ, так что записи и
    /// события одного топика делят одну строку. Ключ живёт, пока на него
    /// ссылаются корзина, записи или события, и освобождается вместе с
    /// ними: процессного пула имён нет.
    pub fn topic_key(
        &self,
        topic: &str,
    ) -> Arc<str> {
        self.topics
            .read()
            .get_key_value(topic)
            .map(|(key, _)| key.clone())
            .unwrap_or_else(|| Arc::from(topic))
    }
}

impl<T> Default for Registry<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
