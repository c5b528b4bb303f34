//! Configuration Module
//!
//! Configuration loading and validation for the relay service.

mod settings;

pub use settings::{
    BroadcastSettings, ConfigError, RelayConfig, ServerSettings, WebSocketSettings,
};
