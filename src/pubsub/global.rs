//! Процессный брокер по умолчанию.
//!
//! Необязательное удобство для кода, которому не хочется протаскивать
//! брокер через конструкторы. Ядро на него не опирается: всё работает и
//! с явно созданным [`MemoryBroker`].

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use once_cell::sync::Lazy;

use super::MemoryBroker;
use crate::error::{BrokerError, BrokerResult};

type Slot = Box<dyn Any + Send + Sync>;

/// Один брокер на тип сообщения: `TypeId(T)` → `Arc<MemoryBroker<T>>`.
static DEFAULT_BROKERS: Lazy<DashMap<TypeId, Slot>> = Lazy::new(DashMap::new);

/// Возвращает брокер по умолчанию для сообщений типа `T`.
///
/// При первом обращении создаётся брокер с настройками по умолчанию.
/// Брокер не открывается автоматически.
pub fn default_broker<T>() -> Arc<MemoryBroker<T>>
where
    T: Send + Sync + 'static,
{
    let mut slot = DEFAULT_BROKERS
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(Arc::new(MemoryBroker::<T>::new())) as Slot);

    if let Some(broker) = slot.value().downcast_ref::<Arc<MemoryBroker<T>>>() {
        return broker.clone();
    }

    // Ключ однозначно задаёт тип, но без паники заменяем слот
    tracing::warn!(type_name = type_name::<T>(), "Default broker slot had foreign type");
    let broker = Arc::new(MemoryBroker::<T>::new());
    *slot = Box::new(broker.clone());
    broker
}

/// Устанавливает брокер по умолчанию для типа `T`.
///
/// Если брокер для `T` уже есть (установлен явно или создан
/// [`default_broker`]), возвращает [`BrokerError::AlreadyInitialized`].
pub fn set_default_broker<T>(broker: Arc<MemoryBroker<T>>) -> BrokerResult<()>
where
    T: Send + Sync + 'static,
{
    match DEFAULT_BROKERS.entry(TypeId::of::<T>()) {
        Entry::Occupied(_) => Err(BrokerError::AlreadyInitialized {
            type_name: type_name::<T>(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(Box::new(broker));
            Ok(())
        }
    }
}
