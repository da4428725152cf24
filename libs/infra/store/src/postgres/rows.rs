//! Raw row shapes for the views and tables `queries.rs` selects from, and
//! their fallible conversion into domain entities.
//!
//! Postgres columns are plain `TEXT`/`TEXT[]`; the domain enums parse out of
//! them via the `FromStr` impls in `signalbox-model`.

use crate::errors::StoreError;
use signalbox_model::{
    CallingOnAspect, LoopAspect, MainAspect, OperatingStatus, PointMachine, PointPosition, ResourceLock, ResourceType, RouteAssignment,
    RouteEvent, RouteEventType, RouteState, Signal, SignalType, TrackCircuit, TrackSegment,
};
use std::collections::HashSet;
use std::str::FromStr;

fn parse_field<T: FromStr<Err = signalbox_model::ParseEnumError>>(column: &'static str, raw: &str) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::IntegrityViolation(format!("column {column} holds unparseable value {raw:?}")))
}

#[derive(Debug, sqlx::FromRow)]
pub struct SignalRow {
    pub signal_id: String,
    pub signal_type: String,
    pub main_aspect: String,
    pub calling_on_aspect: bool,
    pub loop_aspect: bool,
    pub is_locked: bool,
    pub is_active: bool,
    pub possible_aspects: Vec<String>,
    pub protected_track_circuits: Vec<String>,
    pub interlocked_with: Vec<String>,
}

impl TryFrom<SignalRow> for Signal {
    type Error = StoreError;

    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        let possible_aspects = row
            .possible_aspects
            .iter()
            .map(|s| parse_field::<MainAspect>("possible_aspects", s))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(Signal {
            signal_id: row.signal_id,
            signal_type: parse_field::<SignalType>("signal_type", &row.signal_type)?,
            main_aspect: parse_field::<MainAspect>("main_aspect", &row.main_aspect)?,
            calling_on_aspect: CallingOnAspect::from(row.calling_on_aspect),
            loop_aspect: LoopAspect::from(row.loop_aspect),
            is_locked: row.is_locked,
            is_active: row.is_active,
            possible_aspects,
            protected_track_circuits: row.protected_track_circuits,
            interlocked_with: row.interlocked_with,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TrackSegmentRow {
    pub segment_id: String,
    pub circuit_id: String,
    pub is_assigned: bool,
    pub is_overlap: bool,
    pub protecting_signals: Vec<String>,
}

impl From<TrackSegmentRow> for TrackSegment {
    fn from(row: TrackSegmentRow) -> Self {
        TrackSegment {
            segment_id: row.segment_id,
            circuit_id: row.circuit_id,
            is_assigned: row.is_assigned,
            is_overlap: row.is_overlap,
            protecting_signals: row.protecting_signals,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TrackCircuitRow {
    pub circuit_id: String,
    pub is_occupied: bool,
    pub occupied_by: Option<String>,
    pub is_assigned: bool,
    pub is_overlap: bool,
    pub protecting_signals: Vec<String>,
}

impl From<TrackCircuitRow> for TrackCircuit {
    fn from(row: TrackCircuitRow) -> Self {
        TrackCircuit {
            circuit_id: row.circuit_id,
            is_occupied: row.is_occupied,
            occupied_by: row.occupied_by,
            is_assigned: row.is_assigned,
            is_overlap: row.is_overlap,
            protecting_signals: row.protecting_signals,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PointMachineRow {
    pub machine_id: String,
    pub current_position: String,
    pub operating_status: String,
    pub paired_entity: Option<String>,
    pub host_track_circuit: String,
    pub is_locked: bool,
    pub time_lock_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub protected_signals: Vec<String>,
    pub detection_locking_circuits: Vec<String>,
    pub conflicting_machines: Vec<String>,
    pub root_segment: String,
    pub normal_segment: String,
    pub reverse_segment: String,
}

impl TryFrom<PointMachineRow> for PointMachine {
    type Error = StoreError;

    fn try_from(row: PointMachineRow) -> Result<Self, Self::Error> {
        Ok(PointMachine {
            machine_id: row.machine_id,
            current_position: parse_field::<PointPosition>("current_position", &row.current_position)?,
            operating_status: parse_field::<OperatingStatus>("operating_status", &row.operating_status)?,
            paired_entity: row.paired_entity,
            host_track_circuit: row.host_track_circuit,
            is_locked: row.is_locked,
            time_lock_expires_at: row.time_lock_expires_at,
            protected_signals: row.protected_signals,
            detection_locking_circuits: row.detection_locking_circuits,
            conflicting_machines: row.conflicting_machines,
            root_segment: row.root_segment,
            normal_segment: row.normal_segment,
            reverse_segment: row.reverse_segment,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct RouteAssignmentRow {
    pub id: String,
    pub source_signal: String,
    pub dest_signal: String,
    pub direction: String,
    pub assigned_circuits: Vec<String>,
    pub overlap_circuits: Vec<String>,
    pub locked_point_machines: Vec<String>,
    pub state: String,
    pub priority: i32,
    pub operator_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub failure_reason: Option<String>,
    pub performance_metrics: Option<serde_json::Value>,
}

impl TryFrom<RouteAssignmentRow> for RouteAssignment {
    type Error = StoreError;

    fn try_from(row: RouteAssignmentRow) -> Result<Self, Self::Error> {
        Ok(RouteAssignment {
            id: row.id,
            source_signal: row.source_signal,
            dest_signal: row.dest_signal,
            direction: parse_field("direction", &row.direction)?,
            assigned_circuits: row.assigned_circuits,
            overlap_circuits: row.overlap_circuits,
            locked_point_machines: row.locked_point_machines,
            state: parse_field::<RouteState>("state", &row.state)?,
            priority: row.priority,
            operator_id: row.operator_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            failure_reason: row.failure_reason,
            performance_metrics: row.performance_metrics,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ResourceLockRow {
    pub resource_type: String,
    pub resource_id: String,
    pub route_id: String,
    pub lock_type: String,
    pub acquired_at: chrono::DateTime<chrono::Utc>,
    pub is_active: bool,
}

impl TryFrom<ResourceLockRow> for ResourceLock {
    type Error = StoreError;

    fn try_from(row: ResourceLockRow) -> Result<Self, Self::Error> {
        Ok(ResourceLock {
            resource_type: parse_field::<ResourceType>("resource_type", &row.resource_type)?,
            resource_id: row.resource_id,
            route_id: row.route_id,
            lock_type: parse_field("lock_type", &row.lock_type)?,
            acquired_at: row.acquired_at,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct RouteEventRow {
    pub seq: i64,
    pub route_id: String,
    pub event_type: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload: serde_json::Value,
    pub operator_id: String,
    pub source: String,
    pub correlation_id: Option<String>,
    pub response_time_ms: Option<f64>,
    pub safety_critical: bool,
}

impl TryFrom<RouteEventRow> for RouteEvent {
    type Error = StoreError;

    fn try_from(row: RouteEventRow) -> Result<Self, Self::Error> {
        Ok(RouteEvent {
            seq: row.seq,
            route_id: row.route_id,
            event_type: parse_field::<RouteEventType>("event_type", &row.event_type)?,
            timestamp: row.timestamp,
            payload: row.payload,
            operator_id: row.operator_id,
            source: row.source,
            correlation_id: row.correlation_id,
            response_time_ms: row.response_time_ms,
            safety_critical: row.safety_critical,
        })
    }
}
