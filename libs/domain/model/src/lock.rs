//! Resource lock entity.

use crate::enum_codec::ParseEnumError;
use crate::ids::RouteId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    TrackCircuit,
    PointMachine,
    Signal,
}

impl ResourceType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::TrackCircuit => "TRACK_CIRCUIT",
            Self::PointMachine => "POINT_MACHINE",
            Self::Signal => "SIGNAL",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "TRACK_CIRCUIT" => Self::TrackCircuit,
            "POINT_MACHINE" => Self::PointMachine,
            "SIGNAL" => Self::Signal,
            _ => return Err(ParseEnumError { type_name: "ResourceType", value: s.to_string() }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockType {
    Route,
    Overlap,
    Emergency,
    Maintenance,
}

impl LockType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Route => "ROUTE",
            Self::Overlap => "OVERLAP",
            Self::Emergency => "EMERGENCY",
            Self::Maintenance => "MAINTENANCE",
        }
    }
}

impl std::fmt::Display for LockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ROUTE" => Self::Route,
            "OVERLAP" => Self::Overlap,
            "EMERGENCY" => Self::Emergency,
            "MAINTENANCE" => Self::Maintenance,
            _ => return Err(ParseEnumError { type_name: "LockType", value: s.to_string() }),
        })
    }
}

/// `(resource_type, resource_id, route_id, lock_type, acquired_at, is_active)`.
///
/// At most one `Route`, `Emergency` or `Maintenance` lock may be active per
/// resource at a time; `Overlap` locks may coexist per configured policy;
/// `Emergency` and `Maintenance` supersede all other lock types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLock {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub route_id: RouteId,
    pub lock_type: LockType,
    pub acquired_at: chrono::DateTime<chrono::Utc>,
    pub is_active: bool,
}
