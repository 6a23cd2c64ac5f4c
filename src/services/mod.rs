//! Services - aggregation logic and state management
//!
//! - `store` - device record store (per-space partial state)
//! - `bridge` - fragment aggregation, forward trigger, cycle reset

pub mod bridge;
pub mod store;

pub use bridge::Bridge;
pub use store::RecordStore;
