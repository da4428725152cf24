//! Postgres-backed `StoreGateway` (§4.1).

mod notify;
mod procedures;
mod queries;
mod rows;

use crate::errors::StoreError;
use crate::gateway::StoreGateway;
use crate::types::{NewResourceLock, NewRouteAssignment, NewRouteEvent, Notification, PairedUpdateResult, SubsidiaryKind};
use futures::stream::BoxStream;
use signalbox_model::{
    CircuitId, MachineId, MainAspect, PointMachine, PointPosition, ResourceLock, ResourceType, RouteAssignment, RouteEvent, RouteId,
    RouteState, Signal, SignalId, TrackCircuit, TrackSegment,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct PostgresStoreGateway {
    pool: PgPool,
}

impl PostgresStoreGateway {
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        info!(max_connections, "connecting to interlocking store");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(StoreError::from)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl StoreGateway for PostgresStoreGateway {
    async fn get_signal(&self, id: &str) -> Result<Signal, StoreError> {
        queries::get_signal(&self.pool, id).await
    }

    async fn get_track_segment(&self, id: &str) -> Result<TrackSegment, StoreError> {
        queries::get_track_segment(&self.pool, id).await
    }

    async fn get_track_circuit(&self, id: &str) -> Result<TrackCircuit, StoreError> {
        queries::get_track_circuit(&self.pool, id).await
    }

    async fn get_track_circuit_by_segment(&self, segment_id: &str) -> Result<TrackCircuit, StoreError> {
        queries::get_track_circuit_by_segment(&self.pool, segment_id).await
    }

    async fn get_point_machine(&self, id: &str) -> Result<PointMachine, StoreError> {
        queries::get_point_machine(&self.pool, id).await
    }

    async fn get_route_assignment(&self, id: &str) -> Result<RouteAssignment, StoreError> {
        queries::get_route_assignment(&self.pool, id).await
    }

    async fn list_signals(&self) -> Result<Vec<Signal>, StoreError> {
        queries::list_signals(&self.pool).await
    }

    async fn list_track_circuits(&self) -> Result<Vec<TrackCircuit>, StoreError> {
        queries::list_track_circuits(&self.pool).await
    }

    async fn list_point_machines(&self) -> Result<Vec<PointMachine>, StoreError> {
        queries::list_point_machines(&self.pool).await
    }

    async fn list_segments_by_circuit(&self, circuit_id: &str) -> Result<Vec<TrackSegment>, StoreError> {
        queries::list_segments_by_circuit(&self.pool, circuit_id).await
    }

    async fn list_active_routes(&self) -> Result<Vec<RouteAssignment>, StoreError> {
        queries::list_active_routes(&self.pool).await
    }

    async fn list_resource_locks_for(&self, resource_type: ResourceType, resource_id: &str) -> Result<Vec<ResourceLock>, StoreError> {
        queries::list_resource_locks_for(&self.pool, resource_type, resource_id).await
    }

    async fn protecting_signals_from_interlocking_rules(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
        queries::protecting_signals_from_interlocking_rules(&self.pool, circuit_id).await
    }

    async fn protecting_signals_from_track_circuits(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
        queries::protecting_signals_from_track_circuits(&self.pool, circuit_id).await
    }

    async fn protecting_signals_from_track_segments(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
        queries::protecting_signals_from_track_segments(&self.pool, circuit_id).await
    }

    async fn protected_circuits_from_interlocking_rules(&self, signal_id: &str) -> Result<Vec<CircuitId>, StoreError> {
        queries::protected_circuits_from_interlocking_rules(&self.pool, signal_id).await
    }

    async fn update_signal_aspect(&self, signal_id: &str, aspect: MainAspect, operator_id: &str) -> Result<(), StoreError> {
        procedures::update_signal_aspect(&self.pool, signal_id, aspect, operator_id).await
    }

    async fn update_subsidiary_signal_aspect(&self, signal_id: &str, kind: SubsidiaryKind, turned_on: bool, operator_id: &str) -> Result<(), StoreError> {
        procedures::update_subsidiary_signal_aspect(&self.pool, signal_id, kind, turned_on, operator_id).await
    }

    async fn update_point_position_paired(&self, machine_id: &MachineId, requested: PointPosition, operator_id: &str) -> Result<PairedUpdateResult, StoreError> {
        procedures::update_point_position_paired(&self.pool, machine_id, requested, operator_id).await
    }

    async fn update_track_circuit_occupancy(&self, circuit_id: &CircuitId, occupied: bool, occupied_by: Option<&str>) -> Result<(), StoreError> {
        procedures::update_track_circuit_occupancy(&self.pool, circuit_id, occupied, occupied_by).await
    }

    async fn update_track_segment_occupancy(&self, segment_id: &str, occupied: bool) -> Result<(), StoreError> {
        procedures::update_track_segment_occupancy(&self.pool, segment_id, occupied).await
    }

    async fn insert_route_assignment(&self, route: NewRouteAssignment) -> Result<RouteAssignment, StoreError> {
        procedures::insert_route_assignment(&self.pool, route).await
    }

    async fn update_route_state(&self, route_id: &RouteId, new_state: RouteState, operator_id: &str, reason: Option<&str>) -> Result<(), StoreError> {
        procedures::update_route_state(&self.pool, route_id, new_state, operator_id, reason).await
    }

    async fn update_route_performance_metrics(&self, route_id: &RouteId, metrics: serde_json::Value) -> Result<(), StoreError> {
        procedures::update_route_performance_metrics(&self.pool, route_id, metrics).await
    }

    async fn delete_route_assignment(&self, route_id: &RouteId, force_delete: bool) -> Result<(), StoreError> {
        procedures::delete_route_assignment(&self.pool, route_id, force_delete).await
    }

    async fn insert_route_event(&self, event: NewRouteEvent) -> Result<RouteEvent, StoreError> {
        procedures::insert_route_event(&self.pool, event).await
    }

    async fn acquire_resource_lock(&self, lock: NewResourceLock) -> Result<ResourceLock, StoreError> {
        procedures::acquire_resource_lock(&self.pool, lock).await
    }

    async fn release_overlap_locks(&self, route_id: &RouteId) -> Result<u64, StoreError> {
        procedures::release_overlap_locks(&self.pool, route_id).await
    }

    async fn release_resource_locks(&self, route_id: &RouteId) -> Result<u64, StoreError> {
        procedures::release_resource_locks(&self.pool, route_id).await
    }

    async fn subscribe(&self, channel_name: &str) -> Result<BoxStream<'static, Result<Notification, StoreError>>, StoreError> {
        notify::subscribe(&self.pool, channel_name).await
    }
}
