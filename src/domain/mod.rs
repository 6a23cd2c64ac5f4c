//! Domain models - core types for fragment aggregation
//!
//! This module contains the canonical data types used throughout the
//! bridge:
//! - `SpaceRecord` - accumulated per-space state and its cycle machine
//! - `Fragment` / `FragmentValue` - one parsed telemetry message
//! - `SpaceStatus` - occupancy status, persistent across cycles
//! - `SpaceId` - stable space identifier

pub mod record;
pub mod types;
