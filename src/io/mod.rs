//! IO modules - external system interfaces
//!
//! - `mqtt` - MQTT client receiving sensor fragments (topic routing + parsing)
//! - `forwarder` - HTTP delivery of completed records upstream

pub mod forwarder;
pub mod mqtt;

pub use forwarder::{ForwardOutcome, HttpForwarder, RecordSink};
