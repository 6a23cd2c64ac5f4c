//! Shared types for the telemetry bridge

use serde::{Deserialize, Serialize};

/// Newtype wrapper for parking-space identifiers to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SpaceId(pub String);

impl SpaceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SpaceId {
    fn from(s: &str) -> Self {
        SpaceId(s.to_string())
    }
}

/// Occupancy status of a parking space
///
/// Parsed case-insensitively from the firmware's wire strings
/// (`LIVRE`, `OCUPADA`, `MOVIMENTACAO`); unknown strings are carried
/// through verbatim. `Unset` means no status fragment seen yet.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceStatus {
    Unset,
    Free,
    Occupied,
    InMotion,
    Other(String),
}

impl SpaceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SpaceStatus::Unset => "unset",
            SpaceStatus::Free => "livre",
            SpaceStatus::Occupied => "ocupada",
            SpaceStatus::InMotion => "movimentacao",
            SpaceStatus::Other(s) => s,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, SpaceStatus::Unset)
    }
}

impl std::str::FromStr for SpaceStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "livre" => SpaceStatus::Free,
            "ocupada" => SpaceStatus::Occupied,
            "movimentacao" | "em movimentacao" => SpaceStatus::InMotion,
            _ => SpaceStatus::Other(s.to_string()),
        })
    }
}

impl std::fmt::Display for SpaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of an inbound message by topic suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Distance,
    Noise,
    Status,
    Unrecognized,
}

impl FragmentKind {
    pub fn as_str(&self) -> &str {
        match self {
            FragmentKind::Distance => "distance",
            FragmentKind::Noise => "noise",
            FragmentKind::Status => "status",
            FragmentKind::Unrecognized => "unrecognized",
        }
    }
}

/// Value carried by one fragment, typed per kind
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentValue {
    Distance(f64),
    Noise(f64),
    Status(SpaceStatus),
}

impl FragmentValue {
    pub fn kind(&self) -> FragmentKind {
        match self {
            FragmentValue::Distance(_) => FragmentKind::Distance,
            FragmentValue::Noise(_) => FragmentKind::Noise,
            FragmentValue::Status(_) => FragmentKind::Status,
        }
    }
}

/// One parsed telemetry fragment for internal processing
#[derive(Debug, Clone)]
pub struct Fragment {
    pub space_id: SpaceId,
    pub value: FragmentValue,
}

/// Wire payload of a distance fragment
#[derive(Debug, Deserialize)]
pub struct DistancePayload {
    pub id: String,
    pub distancia_cm: f64,
}

/// Wire payload of a noise fragment
#[derive(Debug, Deserialize)]
pub struct NoisePayload {
    pub id: String,
    pub nivel_ruido_raw: f64,
}

/// Wire payload of a status fragment
#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub id: String,
    pub status: String,
}
