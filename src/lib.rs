//! In-process publish/subscribe broker.
//!
//! Messages of one type `T` are published to named topics and delivered
//! asynchronously to handlers on a bounded worker pool. Subscribers either
//! receive every message of a topic (broadcast) or share the topic's
//! messages with the other members of their queue group.

/// Ports: the broker interface application code depends on.
pub mod application;
/// Settings loading (defaults + `MEMBUS_*` environment).
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Health checks.
pub mod health;
/// Logging setup (filters, formatting).
pub mod logging;
/// Pub/Sub: broker, registry, dispatch pool, subscriptions, events.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Broker port.
pub use application::PubSubPort;
/// Settings.
pub use config::{BrokerSettings, Settings};
/// Operation errors and result types.
pub use error::{
    BrokerError, BrokerResult, HandlerError, HandlerResult, LoggingError, SettingsError,
};
/// Health checks.
pub use health::{CheckFn, HealthCheck};
/// Logging.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Pub/Sub API.
pub use pubsub::{
    default_broker, set_default_broker, BrokerStatsSnapshot, ConnectionState, Event, Handler,
    MemoryBroker, PublishOptions, Reason, SubscribeOptions, Subscription,
};
