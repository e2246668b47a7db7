pub mod settings;

pub use settings::{
    BrokerSettings, Settings, DEFAULT_BUFFER, DEFAULT_CLOSE_TIMEOUT_MS, DEFAULT_WORKERS,
    ENV_PREFIX,
};
