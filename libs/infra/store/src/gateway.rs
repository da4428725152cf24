//! The `StoreGateway` trait — a narrow, synchronous-per-call, transactional
//! interface over the authoritative relational store (§4.1).
//!
//! Implementations are injected at construction time (no global singleton,
//! per the "parent-child object graphs with back-references to a mutable
//! database handle" re-architecture note of §9): every branch and manager in
//! this workspace is generic over `G: StoreGateway` or holds an
//! `Arc<G>`, never a `dyn StoreGateway`. Every mutator is individually
//! atomic; see `DESIGN.md` for why the generic `transaction<T>(fn)`
//! combinator of §4.1 is not part of this trait's public surface.

use crate::errors::StoreError;
use crate::types::{NewResourceLock, NewRouteAssignment, NewRouteEvent, Notification, PairedUpdateResult, SubsidiaryKind};
use futures::stream::BoxStream;
use signalbox_model::{
    CircuitId, MachineId, MainAspect, PointMachine, PointPosition, ResourceLock, ResourceType, RouteAssignment, RouteEvent, RouteId,
    RouteState, Signal, SignalId, TrackCircuit, TrackSegment,
};

/// Read and write surface of §4.1. `G::Tx` intentionally does not exist:
/// every method here is already atomic at the implementation level.
#[allow(async_fn_in_trait)]
pub trait StoreGateway: Send + Sync + 'static {
    // --- point queries ---
    async fn get_signal(&self, id: &str) -> Result<Signal, StoreError>;
    async fn get_track_segment(&self, id: &str) -> Result<TrackSegment, StoreError>;
    async fn get_track_circuit(&self, id: &str) -> Result<TrackCircuit, StoreError>;
    async fn get_track_circuit_by_segment(&self, segment_id: &str) -> Result<TrackCircuit, StoreError>;
    async fn get_point_machine(&self, id: &str) -> Result<PointMachine, StoreError>;
    async fn get_route_assignment(&self, id: &str) -> Result<RouteAssignment, StoreError>;

    // --- listings ---
    async fn list_signals(&self) -> Result<Vec<Signal>, StoreError>;
    async fn list_track_circuits(&self) -> Result<Vec<TrackCircuit>, StoreError>;
    async fn list_point_machines(&self) -> Result<Vec<PointMachine>, StoreError>;
    async fn list_segments_by_circuit(&self, circuit_id: &str) -> Result<Vec<TrackSegment>, StoreError>;
    async fn list_active_routes(&self) -> Result<Vec<RouteAssignment>, StoreError>;
    async fn list_resource_locks_for(&self, resource_type: ResourceType, resource_id: &str) -> Result<Vec<ResourceLock>, StoreError>;

    // --- triple-source protecting-signal lookups (§4.1, §4.6) ---
    async fn protecting_signals_from_interlocking_rules(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError>;
    async fn protecting_signals_from_track_circuits(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError>;
    async fn protecting_signals_from_track_segments(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError>;

    /// The inverse of `protecting_signals_from_interlocking_rules`: every
    /// circuit the rules table records this signal as protecting (§4.4 point 3).
    async fn protected_circuits_from_interlocking_rules(&self, signal_id: &str) -> Result<Vec<CircuitId>, StoreError>;

    // --- signal / point-machine mutators ---
    async fn update_signal_aspect(&self, signal_id: &str, aspect: MainAspect, operator_id: &str) -> Result<(), StoreError>;
    async fn update_subsidiary_signal_aspect(
        &self,
        signal_id: &str,
        kind: SubsidiaryKind,
        turned_on: bool,
        operator_id: &str,
    ) -> Result<(), StoreError>;
    async fn update_point_position_paired(
        &self,
        machine_id: &MachineId,
        requested: PointPosition,
        operator_id: &str,
    ) -> Result<PairedUpdateResult, StoreError>;
    async fn update_track_circuit_occupancy(&self, circuit_id: &CircuitId, occupied: bool, occupied_by: Option<&str>) -> Result<(), StoreError>;
    async fn update_track_segment_occupancy(&self, segment_id: &str, occupied: bool) -> Result<(), StoreError>;

    // --- route lifecycle mutators ---
    async fn insert_route_assignment(&self, route: NewRouteAssignment) -> Result<RouteAssignment, StoreError>;
    async fn update_route_state(&self, route_id: &RouteId, new_state: RouteState, operator_id: &str, reason: Option<&str>) -> Result<(), StoreError>;
    async fn update_route_performance_metrics(&self, route_id: &RouteId, metrics: serde_json::Value) -> Result<(), StoreError>;
    async fn delete_route_assignment(&self, route_id: &RouteId, force_delete: bool) -> Result<(), StoreError>;
    async fn insert_route_event(&self, event: NewRouteEvent) -> Result<RouteEvent, StoreError>;

    // --- resource locks ---
    async fn acquire_resource_lock(&self, lock: NewResourceLock) -> Result<ResourceLock, StoreError>;
    async fn release_resource_locks(&self, route_id: &RouteId) -> Result<u64, StoreError>;
    /// Releases only the route's `OVERLAP` locks, for `ACTIVE -> PARTIALLY_RELEASED` (§4.7).
    async fn release_overlap_locks(&self, route_id: &RouteId) -> Result<u64, StoreError>;

    // --- notifications ---
    /// Subscribes to the store's single named notification channel.
    async fn subscribe(&self, channel_name: &str) -> Result<BoxStream<'static, Result<Notification, StoreError>>, StoreError>;
}
