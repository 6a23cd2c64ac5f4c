//! Per-space accumulated record and its cycle state machine
//!
//! A `SpaceRecord` holds everything known about one physical parking space.
//! `status` persists across forward cycles; `distance_cm` and
//! `noise_level_raw` are transient and cleared after every successful
//! forward, which is what re-arms the completeness check for the next
//! cycle.

use crate::domain::types::{FragmentValue, SpaceId, SpaceStatus};

/// Phase of the per-space forward cycle
///
/// `AwaitingFragments` is the resting state. `Forwarding` covers a forward
/// attempt in flight; fragments applied in that window never trigger a
/// second attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    AwaitingFragments,
    Forwarding,
}

/// Accumulated knowledge about one parking space
#[derive(Debug, Clone)]
pub struct SpaceRecord {
    pub id: SpaceId,
    pub status: SpaceStatus,
    pub distance_cm: Option<f64>,
    pub noise_level_raw: Option<f64>,
    phase: CyclePhase,
}

impl SpaceRecord {
    pub fn new(id: SpaceId) -> Self {
        Self {
            id,
            status: SpaceStatus::Unset,
            distance_cm: None,
            noise_level_raw: None,
            phase: CyclePhase::AwaitingFragments,
        }
    }

    /// Overwrite the field matching the fragment kind (last write wins)
    pub fn apply(&mut self, value: FragmentValue) {
        match value {
            FragmentValue::Distance(cm) => self.distance_cm = Some(cm),
            FragmentValue::Noise(raw) => self.noise_level_raw = Some(raw),
            FragmentValue::Status(status) => self.status = status,
        }
    }

    /// True iff all four logical fields are present simultaneously
    pub fn is_complete(&self) -> bool {
        !self.id.as_str().is_empty()
            && self.status.is_set()
            && self.distance_cm.is_some()
            && self.noise_level_raw.is_some()
    }

    /// True iff a forward attempt should be started for this record now
    pub fn ready_to_forward(&self) -> bool {
        self.phase == CyclePhase::AwaitingFragments && self.is_complete()
    }

    /// Mark a forward attempt as in flight
    pub fn begin_forward(&mut self) {
        self.phase = CyclePhase::Forwarding;
    }

    /// Resolve the in-flight forward attempt
    ///
    /// On success the transient fields are cleared; `id` and `status`
    /// survive into the next cycle. On failure the record is left intact
    /// so the next fragment arrival can re-trigger a forward.
    pub fn finish_forward(&mut self, success: bool) {
        if success {
            self.reset_transient();
        }
        self.phase = CyclePhase::AwaitingFragments;
    }

    /// Clear the per-cycle fields, keeping identifier and last known status
    pub fn reset_transient(&mut self) {
        self.distance_cm = None;
        self.noise_level_raw = None;
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }
}
