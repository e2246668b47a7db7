//! Внутрипроцессная подсистема Publish–Subscribe.
//!
//! - `broker`: фасад [`MemoryBroker`]: open / publish / subscribe / close.
//! - `dispatch`: ограниченный пул воркеров, выполняющий доставки.
//! - `registry`: индекс подписок `topic → queue → id`.
//! - `subscriber`: запись подписчика и [`Subscription`] для вызывающего.
//! - `message`: конверт [`Event`], передаваемый обработчику.
//! - `handler`: контракт [`Handler`].
//! - `options`: параметры публикации и подписки.
//! - `stats`: счётчики брокера.
//! - `global`: необязательный брокер по умолчанию на тип сообщения.

pub mod broker;
pub mod dispatch;
pub mod global;
pub mod handler;
pub mod message;
pub mod options;
pub mod registry;
pub mod stats;
pub mod subscriber;

pub use broker::{ConnectionState, MemoryBroker};
pub use dispatch::{DispatchPool, Task};
pub use global::{default_broker, set_default_broker};
pub use handler::Handler;
pub use message::{Event, Reason};
pub use options::{PublishOptions, SubscribeOptions};
pub use registry::{QueueSnapshot, Registry};
pub use stats::{BrokerStats, BrokerStatsSnapshot};
pub use subscriber::{SubscriberEntry, SubscriberId, Subscription};
