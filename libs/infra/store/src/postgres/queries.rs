//! Read-only queries against the views of §4.1 (`v_signals_complete`,
//! `v_point_machines_complete`, ...).

use crate::errors::StoreError;
use crate::postgres::rows::{PointMachineRow, ResourceLockRow, RouteAssignmentRow, SignalRow, TrackCircuitRow, TrackSegmentRow};
use signalbox_model::{PointMachine, ResourceLock, ResourceType, RouteAssignment, Signal, SignalId, TrackCircuit, TrackSegment};
use sqlx::PgPool;
use tracing::instrument;

#[instrument(skip(pool))]
pub async fn get_signal(pool: &PgPool, id: &str) -> Result<Signal, StoreError> {
    let row: Option<SignalRow> = sqlx::query_as("SELECT * FROM v_signals_complete WHERE signal_id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| StoreError::not_found("signal", id))?.try_into()
}

#[instrument(skip(pool))]
pub async fn get_track_segment(pool: &PgPool, id: &str) -> Result<TrackSegment, StoreError> {
    let row: Option<TrackSegmentRow> = sqlx::query_as("SELECT * FROM v_track_segments_complete WHERE segment_id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.ok_or_else(|| StoreError::not_found("track_segment", id))?.into())
}

#[instrument(skip(pool))]
pub async fn get_track_circuit(pool: &PgPool, id: &str) -> Result<TrackCircuit, StoreError> {
    let row: Option<TrackCircuitRow> = sqlx::query_as("SELECT * FROM v_track_circuits_complete WHERE circuit_id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.ok_or_else(|| StoreError::not_found("track_circuit", id))?.into())
}

#[instrument(skip(pool))]
pub async fn get_track_circuit_by_segment(pool: &PgPool, segment_id: &str) -> Result<TrackCircuit, StoreError> {
    let row: Option<TrackCircuitRow> = sqlx::query_as(
        "SELECT c.* FROM v_track_circuits_complete c
         JOIN v_track_segments_complete s ON s.circuit_id = c.circuit_id
         WHERE s.segment_id = $1",
    )
    .bind(segment_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.ok_or_else(|| StoreError::not_found("track_circuit_by_segment", segment_id))?.into())
}

#[instrument(skip(pool))]
pub async fn get_point_machine(pool: &PgPool, id: &str) -> Result<PointMachine, StoreError> {
    let row: Option<PointMachineRow> = sqlx::query_as("SELECT * FROM v_point_machines_complete WHERE machine_id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| StoreError::not_found("point_machine", id))?.try_into()
}

#[instrument(skip(pool))]
pub async fn get_route_assignment(pool: &PgPool, id: &str) -> Result<RouteAssignment, StoreError> {
    let row: Option<RouteAssignmentRow> = sqlx::query_as("SELECT * FROM route_assignments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(|| StoreError::not_found("route_assignment", id))?.try_into()
}

#[instrument(skip(pool))]
pub async fn list_signals(pool: &PgPool) -> Result<Vec<Signal>, StoreError> {
    let rows: Vec<SignalRow> = sqlx::query_as("SELECT * FROM v_signals_complete ORDER BY signal_id").fetch_all(pool).await?;
    rows.into_iter().map(Signal::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn list_track_circuits(pool: &PgPool) -> Result<Vec<TrackCircuit>, StoreError> {
    let rows: Vec<TrackCircuitRow> = sqlx::query_as("SELECT * FROM v_track_circuits_complete ORDER BY circuit_id").fetch_all(pool).await?;
    Ok(rows.into_iter().map(TrackCircuit::from).collect())
}

#[instrument(skip(pool))]
pub async fn list_point_machines(pool: &PgPool) -> Result<Vec<PointMachine>, StoreError> {
    let rows: Vec<PointMachineRow> = sqlx::query_as("SELECT * FROM v_point_machines_complete ORDER BY machine_id").fetch_all(pool).await?;
    rows.into_iter().map(PointMachine::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn list_segments_by_circuit(pool: &PgPool, circuit_id: &str) -> Result<Vec<TrackSegment>, StoreError> {
    let rows: Vec<TrackSegmentRow> = sqlx::query_as("SELECT * FROM v_track_segments_complete WHERE circuit_id = $1 ORDER BY segment_id")
        .bind(circuit_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(TrackSegment::from).collect())
}

#[instrument(skip(pool))]
pub async fn list_active_routes(pool: &PgPool) -> Result<Vec<RouteAssignment>, StoreError> {
    let rows: Vec<RouteAssignmentRow> = sqlx::query_as(
        "SELECT * FROM route_assignments WHERE state NOT IN ('RELEASED', 'FAILED') ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(RouteAssignment::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn list_resource_locks_for(pool: &PgPool, resource_type: ResourceType, resource_id: &str) -> Result<Vec<ResourceLock>, StoreError> {
    let rows: Vec<ResourceLockRow> = sqlx::query_as(
        "SELECT * FROM resource_locks WHERE resource_type = $1 AND resource_id = $2 AND is_active ORDER BY acquired_at",
    )
    .bind(resource_type.to_string())
    .bind(resource_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(ResourceLock::try_from).collect()
}

/// The three independent sources the triple-source consistency check (§4.6)
/// compares: the rule document's `controlled_by` graph (mirrored into
/// `interlocking_rules` at load time), `track_circuits.protecting_signals`,
/// and `track_segments.protecting_signals` aggregated up to circuit level.
#[instrument(skip(pool))]
pub async fn protecting_signals_from_interlocking_rules(pool: &PgPool, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT signal_id FROM interlocking_rules WHERE protected_circuit_id = $1 ORDER BY signal_id",
    )
    .bind(circuit_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[instrument(skip(pool))]
pub async fn protecting_signals_from_track_circuits(pool: &PgPool, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
    let row: Option<(Vec<String>,)> = sqlx::query_as("SELECT protecting_signals FROM track_circuits WHERE circuit_id = $1")
        .bind(circuit_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(signals,)| signals).unwrap_or_default())
}

#[instrument(skip(pool))]
pub async fn protected_circuits_from_interlocking_rules(pool: &PgPool, signal_id: &str) -> Result<Vec<signalbox_model::CircuitId>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT protected_circuit_id FROM interlocking_rules WHERE signal_id = $1 ORDER BY protected_circuit_id",
    )
    .bind(signal_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[instrument(skip(pool))]
pub async fn protecting_signals_from_track_segments(pool: &PgPool, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
    let rows: Vec<(Vec<String>,)> = sqlx::query_as("SELECT protecting_signals FROM track_segments WHERE circuit_id = $1")
        .bind(circuit_id)
        .fetch_all(pool)
        .await?;
    let mut signals: Vec<SignalId> = rows.into_iter().flat_map(|(s,)| s).collect();
    signals.sort();
    signals.dedup();
    Ok(signals)
}
