//! Point machine entity.

use crate::enum_codec::ParseEnumError;
use crate::ids::{CircuitId, MachineId, SegmentId, SignalId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointPosition {
    Normal,
    Reverse,
}

impl PointPosition {
    pub const fn opposite(self) -> Self {
        match self {
            Self::Normal => Self::Reverse,
            Self::Reverse => Self::Normal,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Reverse => "REVERSE",
        }
    }
}

impl std::fmt::Display for PointPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointPosition {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NORMAL" => Self::Normal,
            "REVERSE" => Self::Reverse,
            _ => return Err(ParseEnumError { type_name: "PointPosition", value: s.to_string() }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingStatus {
    Available,
    InTransition,
    Failed,
    LockedOut,
    Maintenance,
}

impl OperatingStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::InTransition => "IN_TRANSITION",
            Self::Failed => "FAILED",
            Self::LockedOut => "LOCKED_OUT",
            Self::Maintenance => "MAINTENANCE",
        }
    }
}

impl std::fmt::Display for OperatingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "AVAILABLE" => Self::Available,
            "IN_TRANSITION" => Self::InTransition,
            "FAILED" => Self::Failed,
            "LOCKED_OUT" => Self::LockedOut,
            "MAINTENANCE" => Self::Maintenance,
            _ => return Err(ParseEnumError { type_name: "OperatingStatus", value: s.to_string() }),
        })
    }
}

/// A point machine as projected from `v_point_machines_complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointMachine {
    pub machine_id: MachineId,
    pub current_position: PointPosition,
    pub operating_status: OperatingStatus,
    pub paired_entity: Option<MachineId>,
    pub host_track_circuit: CircuitId,
    pub is_locked: bool,
    pub time_lock_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub protected_signals: Vec<SignalId>,
    pub detection_locking_circuits: Vec<CircuitId>,
    pub conflicting_machines: Vec<MachineId>,
    pub root_segment: SegmentId,
    pub normal_segment: SegmentId,
    pub reverse_segment: SegmentId,
}

impl PointMachine {
    pub fn is_available(&self) -> bool {
        self.operating_status == OperatingStatus::Available
    }

    /// The segment a move to `position` would occupy, in addition to the root.
    pub fn target_segment(&self, position: PointPosition) -> &SegmentId {
        match position {
            PointPosition::Normal => &self.normal_segment,
            PointPosition::Reverse => &self.reverse_segment,
        }
    }

    pub fn affected_segments(&self, requested: PointPosition) -> Vec<&SegmentId> {
        vec![&self.root_segment, self.target_segment(requested)]
    }

    /// Whether a currently-active time lock still holds.
    pub fn time_lock_active(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        matches!(self.time_lock_expires_at, Some(expires_at) if expires_at > now)
    }
}
