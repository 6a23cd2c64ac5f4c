//! Infrastructure - configuration, metrics, and broker
//!
//! - `config` - application configuration (TOML loading, defaults)
//! - `metrics` - lock-free metrics collection
//! - `broker` - optional embedded MQTT broker (rumqttd)

pub mod broker;
pub mod config;
pub mod metrics;

pub use config::Config;
pub use metrics::Metrics;
