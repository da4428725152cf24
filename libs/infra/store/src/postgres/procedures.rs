//! Write paths. Paired point operation and occupancy settlement are pushed
//! down into Postgres functions (`sp_set_point_position`,
//! `sp_acquire_resource_lock`) so the mismatch-correction and lock-exclusivity
//! checks of §4.1/§4.5 run inside the same transaction as the write, not as
//! a read-then-write race in application code.

use crate::errors::StoreError;
use crate::postgres::rows::RouteEventRow;
use crate::types::{NewResourceLock, NewRouteAssignment, NewRouteEvent, PairedUpdateResult, SubsidiaryKind};
use signalbox_model::{MachineId, PointPosition, ResourceLock, RouteAssignment, RouteEvent, RouteId, RouteState};
use sqlx::PgPool;
use tracing::instrument;

use super::rows::RouteAssignmentRow;

#[instrument(skip(pool))]
pub async fn update_signal_aspect(pool: &PgPool, signal_id: &str, aspect: signalbox_model::MainAspect, operator_id: &str) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE signals SET main_aspect = $1, updated_by = $2, updated_at = now() WHERE signal_id = $3")
        .bind(aspect.to_string())
        .bind(operator_id)
        .bind(signal_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("signal", signal_id));
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn update_subsidiary_signal_aspect(
    pool: &PgPool,
    signal_id: &str,
    kind: SubsidiaryKind,
    turned_on: bool,
    operator_id: &str,
) -> Result<(), StoreError> {
    let column = match kind {
        SubsidiaryKind::CallingOn => "calling_on_aspect",
        SubsidiaryKind::Loop => "loop_aspect",
    };
    let sql = format!("UPDATE signals SET {column} = $1, updated_by = $2, updated_at = now() WHERE signal_id = $3");
    let result = sqlx::query(&sql).bind(turned_on).bind(operator_id).bind(signal_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("signal", signal_id));
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn update_point_position_paired(
    pool: &PgPool,
    machine_id: &MachineId,
    requested: PointPosition,
    operator_id: &str,
) -> Result<PairedUpdateResult, StoreError> {
    let row: (String, String, bool) = sqlx::query_as("SELECT * FROM sp_set_point_position($1, $2, $3)")
        .bind(machine_id)
        .bind(requested.to_string())
        .bind(operator_id)
        .fetch_one(pool)
        .await?;
    Ok(PairedUpdateResult {
        machine_position: row.0.parse().map_err(|_| StoreError::IntegrityViolation("sp_set_point_position returned unparseable position".into()))?,
        paired_position: row.1.parse().map_err(|_| StoreError::IntegrityViolation("sp_set_point_position returned unparseable paired position".into()))?,
        position_mismatch_corrected: row.2,
    })
}

#[instrument(skip(pool))]
pub async fn update_track_circuit_occupancy(pool: &PgPool, circuit_id: &str, occupied: bool, occupied_by: Option<&str>) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE track_circuits SET is_occupied = $1, occupied_by = $2, updated_at = now() WHERE circuit_id = $3")
        .bind(occupied)
        .bind(occupied_by)
        .bind(circuit_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("track_circuit", circuit_id));
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn update_track_segment_occupancy(pool: &PgPool, segment_id: &str, occupied: bool) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE track_segments SET is_assigned = $1, updated_at = now() WHERE segment_id = $2")
        .bind(occupied)
        .bind(segment_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("track_segment", segment_id));
    }
    Ok(())
}

#[instrument(skip(pool, route))]
pub async fn insert_route_assignment(pool: &PgPool, route: NewRouteAssignment) -> Result<RouteAssignment, StoreError> {
    let row: RouteAssignmentRow = sqlx::query_as(
        "INSERT INTO route_assignments
            (id, source_signal, dest_signal, direction, assigned_circuits, overlap_circuits,
             locked_point_machines, state, priority, operator_id, created_at, updated_at)
         VALUES (gen_random_uuid()::text, $1, $2, $3, $4, $5, $6, 'RESERVED', $7, $8, now(), now())
         RETURNING *",
    )
    .bind(&route.source_signal)
    .bind(&route.dest_signal)
    .bind(route.direction.to_string())
    .bind(&route.assigned_circuits)
    .bind(&route.overlap_circuits)
    .bind(&route.locked_point_machines)
    .bind(route.priority)
    .bind(&route.operator_id)
    .fetch_one(pool)
    .await?;
    row.try_into()
}

#[instrument(skip(pool))]
pub async fn update_route_state(pool: &PgPool, route_id: &RouteId, new_state: RouteState, operator_id: &str, reason: Option<&str>) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE route_assignments SET state = $1, failure_reason = $2, updated_at = now() WHERE id = $3",
    )
    .bind(new_state.to_string())
    .bind(reason)
    .bind(route_id)
    .execute(pool)
    .await?;
    let _ = operator_id; // the operator is recorded on the route_events row, not here
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("route_assignment", route_id));
    }
    Ok(())
}

#[instrument(skip(pool, metrics))]
pub async fn update_route_performance_metrics(pool: &PgPool, route_id: &RouteId, metrics: serde_json::Value) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE route_assignments SET performance_metrics = $1, updated_at = now() WHERE id = $2")
        .bind(metrics)
        .bind(route_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("route_assignment", route_id));
    }
    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_route_assignment(pool: &PgPool, route_id: &RouteId, force_delete: bool) -> Result<(), StoreError> {
    if !force_delete {
        let state: Option<(String,)> = sqlx::query_as("SELECT state FROM route_assignments WHERE id = $1").bind(route_id).fetch_optional(pool).await?;
        match state {
            None => return Err(StoreError::not_found("route_assignment", route_id)),
            Some((state,)) if state != "RELEASED" && state != "FAILED" => {
                return Err(StoreError::ProcedureRejected(format!("route {route_id} is not terminal ({state}); pass force_delete to override")));
            }
            Some(_) => {}
        }
    }
    let result = sqlx::query("DELETE FROM route_assignments WHERE id = $1").bind(route_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("route_assignment", route_id));
    }
    Ok(())
}

#[instrument(skip(pool, event))]
pub async fn insert_route_event(pool: &PgPool, event: NewRouteEvent) -> Result<RouteEvent, StoreError> {
    let row: RouteEventRow = sqlx::query_as(
        "INSERT INTO route_events
            (seq, route_id, event_type, timestamp, payload, operator_id, source, correlation_id, response_time_ms, safety_critical)
         VALUES (
            (SELECT COALESCE(MAX(seq), 0) + 1 FROM route_events WHERE route_id = $1),
            $1, $2, now(), $3, $4, $5, $6, $7, $8
         )
         RETURNING *",
    )
    .bind(&event.route_id)
    .bind(event.event_type.to_string())
    .bind(&event.payload)
    .bind(&event.operator_id)
    .bind(&event.source)
    .bind(&event.correlation_id)
    .bind(event.response_time_ms)
    .bind(event.safety_critical)
    .fetch_one(pool)
    .await?;
    row.try_into()
}

#[instrument(skip(pool, lock))]
pub async fn acquire_resource_lock(pool: &PgPool, lock: NewResourceLock) -> Result<ResourceLock, StoreError> {
    let row: super::rows::ResourceLockRow = sqlx::query_as("SELECT * FROM sp_acquire_resource_lock($1, $2, $3, $4)")
        .bind(lock.resource_type.to_string())
        .bind(&lock.resource_id)
        .bind(&lock.route_id)
        .bind(lock.lock_type.to_string())
        .fetch_one(pool)
        .await?;
    row.try_into()
}

#[instrument(skip(pool))]
pub async fn release_resource_locks(pool: &PgPool, route_id: &RouteId) -> Result<u64, StoreError> {
    let result = sqlx::query("UPDATE resource_locks SET is_active = false WHERE route_id = $1 AND is_active")
        .bind(route_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[instrument(skip(pool))]
pub async fn release_overlap_locks(pool: &PgPool, route_id: &RouteId) -> Result<u64, StoreError> {
    let result = sqlx::query("UPDATE resource_locks SET is_active = false WHERE route_id = $1 AND is_active AND lock_type = 'OVERLAP'")
        .bind(route_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
