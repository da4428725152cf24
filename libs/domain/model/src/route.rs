//! Route assignment state machine and event journal entities.

use crate::enum_codec::ParseEnumError;
use crate::ids::{CircuitId, MachineId, OperatorId, RouteId, SignalId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            _ => return Err(ParseEnumError { type_name: "Direction", value: s.to_string() }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteState {
    Reserved,
    Active,
    PartiallyReleased,
    Released,
    Failed,
}

impl RouteState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "RESERVED",
            Self::Active => "ACTIVE",
            Self::PartiallyReleased => "PARTIALLY_RELEASED",
            Self::Released => "RELEASED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RouteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "RESERVED" => Self::Reserved,
            "ACTIVE" => Self::Active,
            "PARTIALLY_RELEASED" => Self::PartiallyReleased,
            "RELEASED" => Self::Released,
            "FAILED" => Self::Failed,
            _ => return Err(ParseEnumError { type_name: "RouteState", value: s.to_string() }),
        })
    }
}

impl RouteState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Failed)
    }

    /// The route state machine of §4.7:
    /// `RESERVED -> ACTIVE -> RELEASED`, `RESERVED|ACTIVE -> FAILED`,
    /// `ACTIVE -> PARTIALLY_RELEASED -> RELEASED`. `RELEASED`/`FAILED` are terminal.
    pub fn can_transition_to(self, next: Self) -> bool {
        use RouteState::*;
        matches!(
            (self, next),
            (Reserved, Active) | (Reserved, Failed) | (Active, Failed) | (Active, Released) | (Active, PartiallyReleased) | (PartiallyReleased, Released)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAssignment {
    pub id: RouteId,
    pub source_signal: SignalId,
    pub dest_signal: SignalId,
    pub direction: Direction,
    pub assigned_circuits: Vec<CircuitId>,
    pub overlap_circuits: Vec<CircuitId>,
    pub locked_point_machines: Vec<MachineId>,
    pub state: RouteState,
    pub priority: i32,
    pub operator_id: OperatorId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub failure_reason: Option<String>,
    /// Opaque latency/telemetry payload, see `update_route_performance_metrics`.
    pub performance_metrics: Option<serde_json::Value>,
}

impl RouteAssignment {
    pub fn is_non_terminal(&self) -> bool {
        !self.state.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteEventType {
    Created,
    StateChanged,
    Activated,
    Released,
    Failed,
    Deleted,
    LockAcquired,
    LockReleased,
    PositionMismatchCorrected,
    PartiallyReleased,
}

impl RouteEventType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::StateChanged => "STATE_CHANGED",
            Self::Activated => "ACTIVATED",
            Self::Released => "RELEASED",
            Self::Failed => "FAILED",
            Self::Deleted => "DELETED",
            Self::LockAcquired => "LOCK_ACQUIRED",
            Self::LockReleased => "LOCK_RELEASED",
            Self::PositionMismatchCorrected => "POSITION_MISMATCH_CORRECTED",
            Self::PartiallyReleased => "PARTIALLY_RELEASED",
        }
    }
}

impl std::fmt::Display for RouteEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteEventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CREATED" => Self::Created,
            "STATE_CHANGED" => Self::StateChanged,
            "ACTIVATED" => Self::Activated,
            "RELEASED" => Self::Released,
            "FAILED" => Self::Failed,
            "DELETED" => Self::Deleted,
            "LOCK_ACQUIRED" => Self::LockAcquired,
            "LOCK_RELEASED" => Self::LockReleased,
            "POSITION_MISMATCH_CORRECTED" => Self::PositionMismatchCorrected,
            "PARTIALLY_RELEASED" => Self::PartiallyReleased,
            _ => return Err(ParseEnumError { type_name: "RouteEventType", value: s.to_string() }),
        })
    }
}

/// An append-only journal entry. Per-route `seq` is strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEvent {
    pub seq: i64,
    pub route_id: RouteId,
    pub event_type: RouteEventType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload: serde_json::Value,
    pub operator_id: OperatorId,
    pub source: String,
    pub correlation_id: Option<String>,
    pub response_time_ms: Option<f64>,
    pub safety_critical: bool,
}

#[cfg(test)]
mod tests {
    use super::RouteState::*;

    #[test]
    fn state_machine_allows_only_the_documented_edges() {
        assert!(Reserved.can_transition_to(Active));
        assert!(Reserved.can_transition_to(Failed));
        assert!(Active.can_transition_to(Failed));
        assert!(Active.can_transition_to(Released));
        assert!(Active.can_transition_to(PartiallyReleased));
        assert!(PartiallyReleased.can_transition_to(Released));

        assert!(!Reserved.can_transition_to(Released));
        assert!(!Reserved.can_transition_to(PartiallyReleased));
        assert!(!Released.can_transition_to(Active));
        assert!(!Failed.can_transition_to(Active));
        assert!(!PartiallyReleased.can_transition_to(Active));
    }

    #[test]
    fn terminal_states_are_released_and_failed() {
        assert!(Released.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Reserved.is_terminal());
        assert!(!Active.is_terminal());
        assert!(!PartiallyReleased.is_terminal());
    }
}
