//! DTOs exchanged across the Store Gateway boundary.

use serde::{Deserialize, Serialize};
use signalbox_model::{
    CircuitId, Direction, LockType, MachineId, OperatorId, PointPosition, ResourceType, RouteEventType, RouteId, SignalId,
};

/// A row of the store's single notification channel, JSON-decoded from
/// `{table, operation, entity_id, test?}` (§4.1, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub table: String,
    pub operation: NotificationOperation,
    pub entity_id: String,
    /// Present and `Some("startup")` for the self-test notification emitted
    /// once at startup; counts toward health but never triggers a refresh.
    #[serde(default)]
    pub test: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationOperation {
    Insert,
    Update,
    Delete,
}

/// Subsidiary aspect kind, for `update_subsidiary_signal_aspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsidiaryKind {
    CallingOn,
    Loop,
}

/// Result of `update_point_position_paired`: the procedure corrects a
/// settled-position mismatch itself and reports whether it had to.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedUpdateResult {
    pub machine_position: PointPosition,
    pub paired_position: PointPosition,
    pub position_mismatch_corrected: bool,
}

#[derive(Debug, Clone)]
pub struct NewRouteAssignment {
    pub source_signal: SignalId,
    pub dest_signal: SignalId,
    pub direction: Direction,
    pub assigned_circuits: Vec<CircuitId>,
    pub overlap_circuits: Vec<CircuitId>,
    pub locked_point_machines: Vec<MachineId>,
    pub priority: i32,
    pub operator_id: OperatorId,
}

#[derive(Debug, Clone)]
pub struct NewResourceLock {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub route_id: RouteId,
    pub lock_type: LockType,
}

#[derive(Debug, Clone)]
pub struct NewRouteEvent {
    pub route_id: RouteId,
    pub event_type: RouteEventType,
    pub payload: serde_json::Value,
    pub operator_id: OperatorId,
    pub source: String,
    pub correlation_id: Option<String>,
    pub response_time_ms: Option<f64>,
    pub safety_critical: bool,
}
