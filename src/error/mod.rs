pub mod pubsub;
pub mod system;

pub use pubsub::{BrokerError, BrokerResult, HandlerError, HandlerResult};
pub use system::{LoggingError, SettingsError};
