//! In-memory `StoreGateway` double, for tests in `signalbox-validation`,
//! `signalbox-routes` and `signalbox-service` that need a gateway but not a
//! live Postgres instance.

use crate::errors::StoreError;
use crate::gateway::StoreGateway;
use crate::types::{NewResourceLock, NewRouteAssignment, NewRouteEvent, Notification, PairedUpdateResult, SubsidiaryKind};
use futures::stream::{self, BoxStream, StreamExt};
use signalbox_model::{
    CircuitId, MachineId, MainAspect, PointMachine, PointPosition, ResourceLock, ResourceType, RouteAssignment, RouteEvent, RouteId,
    RouteState, Signal, SignalId, TrackCircuit, TrackSegment,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Holds every entity in a plain `HashMap` behind a single mutex. Fine for
/// unit tests; not a model for what the real gateway should look like under
/// concurrency (see `PostgresStoreGateway`, where each mutator is atomic at
/// the database level instead).
#[derive(Default)]
pub struct InMemoryStoreGateway {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    signals: HashMap<SignalId, Signal>,
    track_segments: HashMap<String, TrackSegment>,
    track_circuits: HashMap<CircuitId, TrackCircuit>,
    point_machines: HashMap<MachineId, PointMachine>,
    routes: HashMap<RouteId, RouteAssignment>,
    route_events: HashMap<RouteId, Vec<RouteEvent>>,
    resource_locks: Vec<ResourceLock>,
    next_route_id: u64,
    /// Mirrors the `interlocking_rules` table: signal_id -> protected circuits.
    rule_protected_circuits: HashMap<SignalId, Vec<CircuitId>>,
}

impl InMemoryStoreGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_signal(&self, signal: Signal) {
        self.inner.lock().unwrap().signals.insert(signal.signal_id.clone(), signal);
    }

    pub fn seed_track_segment(&self, segment: TrackSegment) {
        self.inner.lock().unwrap().track_segments.insert(segment.segment_id.clone(), segment);
    }

    pub fn seed_track_circuit(&self, circuit: TrackCircuit) {
        self.inner.lock().unwrap().track_circuits.insert(circuit.circuit_id.clone(), circuit);
    }

    pub fn seed_point_machine(&self, machine: PointMachine) {
        self.inner.lock().unwrap().point_machines.insert(machine.machine_id.clone(), machine);
    }

    /// Seeds the `interlocking_rules` mirror consulted by
    /// `protected_circuits_from_interlocking_rules`. Tests that exercise the
    /// triple-source consistency check call this to agree with (or
    /// deliberately disagree with) a signal's own `protected_track_circuits`.
    pub fn seed_rule_protected_circuits(&self, signal_id: impl Into<SignalId>, circuits: Vec<CircuitId>) {
        self.inner.lock().unwrap().rule_protected_circuits.insert(signal_id.into(), circuits);
    }
}

impl StoreGateway for InMemoryStoreGateway {
    async fn get_signal(&self, id: &str) -> Result<Signal, StoreError> {
        self.inner.lock().unwrap().signals.get(id).cloned().ok_or_else(|| StoreError::not_found("signal", id))
    }

    async fn get_track_segment(&self, id: &str) -> Result<TrackSegment, StoreError> {
        self.inner.lock().unwrap().track_segments.get(id).cloned().ok_or_else(|| StoreError::not_found("track_segment", id))
    }

    async fn get_track_circuit(&self, id: &str) -> Result<TrackCircuit, StoreError> {
        self.inner.lock().unwrap().track_circuits.get(id).cloned().ok_or_else(|| StoreError::not_found("track_circuit", id))
    }

    async fn get_track_circuit_by_segment(&self, segment_id: &str) -> Result<TrackCircuit, StoreError> {
        let state = self.inner.lock().unwrap();
        let segment = state.track_segments.get(segment_id).ok_or_else(|| StoreError::not_found("track_segment", segment_id))?;
        state.track_circuits.get(&segment.circuit_id).cloned().ok_or_else(|| StoreError::not_found("track_circuit", &segment.circuit_id))
    }

    async fn get_point_machine(&self, id: &str) -> Result<PointMachine, StoreError> {
        self.inner.lock().unwrap().point_machines.get(id).cloned().ok_or_else(|| StoreError::not_found("point_machine", id))
    }

    async fn get_route_assignment(&self, id: &str) -> Result<RouteAssignment, StoreError> {
        self.inner.lock().unwrap().routes.get(id).cloned().ok_or_else(|| StoreError::not_found("route_assignment", id))
    }

    async fn list_signals(&self) -> Result<Vec<Signal>, StoreError> {
        let mut signals: Vec<_> = self.inner.lock().unwrap().signals.values().cloned().collect();
        signals.sort_by(|a, b| a.signal_id.cmp(&b.signal_id));
        Ok(signals)
    }

    async fn list_track_circuits(&self) -> Result<Vec<TrackCircuit>, StoreError> {
        let mut circuits: Vec<_> = self.inner.lock().unwrap().track_circuits.values().cloned().collect();
        circuits.sort_by(|a, b| a.circuit_id.cmp(&b.circuit_id));
        Ok(circuits)
    }

    async fn list_point_machines(&self) -> Result<Vec<PointMachine>, StoreError> {
        let mut machines: Vec<_> = self.inner.lock().unwrap().point_machines.values().cloned().collect();
        machines.sort_by(|a, b| a.machine_id.cmp(&b.machine_id));
        Ok(machines)
    }

    async fn list_segments_by_circuit(&self, circuit_id: &str) -> Result<Vec<TrackSegment>, StoreError> {
        let mut segments: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .track_segments
            .values()
            .filter(|s| s.circuit_id == circuit_id)
            .cloned()
            .collect();
        segments.sort_by(|a, b| a.segment_id.cmp(&b.segment_id));
        Ok(segments)
    }

    async fn list_active_routes(&self) -> Result<Vec<RouteAssignment>, StoreError> {
        let mut routes: Vec<_> = self.inner.lock().unwrap().routes.values().filter(|r| r.is_non_terminal()).cloned().collect();
        routes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(routes)
    }

    async fn list_resource_locks_for(&self, resource_type: ResourceType, resource_id: &str) -> Result<Vec<ResourceLock>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .resource_locks
            .iter()
            .filter(|l| l.resource_type == resource_type && l.resource_id == resource_id && l.is_active)
            .cloned()
            .collect())
    }

    async fn protecting_signals_from_interlocking_rules(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .signals
            .values()
            .filter(|s| s.protected_track_circuits.iter().any(|c| c == circuit_id))
            .map(|s| s.signal_id.clone())
            .collect())
    }

    async fn protecting_signals_from_track_circuits(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
        Ok(self.inner.lock().unwrap().track_circuits.get(circuit_id).map(|c| c.protecting_signals.clone()).unwrap_or_default())
    }

    async fn protecting_signals_from_track_segments(&self, circuit_id: &str) -> Result<Vec<SignalId>, StoreError> {
        let mut signals: Vec<SignalId> = self
            .inner
            .lock()
            .unwrap()
            .track_segments
            .values()
            .filter(|s| s.circuit_id == circuit_id)
            .flat_map(|s| s.protecting_signals.clone())
            .collect();
        signals.sort();
        signals.dedup();
        Ok(signals)
    }

    async fn protected_circuits_from_interlocking_rules(&self, signal_id: &str) -> Result<Vec<CircuitId>, StoreError> {
        Ok(self.inner.lock().unwrap().rule_protected_circuits.get(signal_id).cloned().unwrap_or_default())
    }

    async fn update_signal_aspect(&self, signal_id: &str, aspect: MainAspect, _operator_id: &str) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let signal = state.signals.get_mut(signal_id).ok_or_else(|| StoreError::not_found("signal", signal_id))?;
        signal.main_aspect = aspect;
        Ok(())
    }

    async fn update_subsidiary_signal_aspect(&self, signal_id: &str, kind: SubsidiaryKind, turned_on: bool, _operator_id: &str) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let signal = state.signals.get_mut(signal_id).ok_or_else(|| StoreError::not_found("signal", signal_id))?;
        match kind {
            SubsidiaryKind::CallingOn => signal.calling_on_aspect = turned_on.into(),
            SubsidiaryKind::Loop => signal.loop_aspect = turned_on.into(),
        }
        Ok(())
    }

    async fn update_point_position_paired(&self, machine_id: &MachineId, requested: PointPosition, _operator_id: &str) -> Result<PairedUpdateResult, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let paired_id = {
            let machine = state.point_machines.get_mut(machine_id).ok_or_else(|| StoreError::not_found("point_machine", machine_id))?;
            machine.current_position = requested;
            machine.paired_entity.clone()
        };

        let mut position_mismatch_corrected = false;
        let paired_position = if let Some(paired_id) = paired_id {
            let paired = state.point_machines.get_mut(&paired_id).ok_or_else(|| StoreError::not_found("point_machine", &paired_id))?;
            if paired.current_position != requested {
                paired.current_position = requested;
                position_mismatch_corrected = true;
            }
            paired.current_position
        } else {
            requested
        };

        Ok(PairedUpdateResult { machine_position: requested, paired_position, position_mismatch_corrected })
    }

    async fn update_track_circuit_occupancy(&self, circuit_id: &CircuitId, occupied: bool, occupied_by: Option<&str>) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let circuit = state.track_circuits.get_mut(circuit_id).ok_or_else(|| StoreError::not_found("track_circuit", circuit_id))?;
        circuit.is_occupied = occupied;
        circuit.occupied_by = occupied_by.map(str::to_string);
        Ok(())
    }

    async fn update_track_segment_occupancy(&self, segment_id: &str, occupied: bool) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let segment = state.track_segments.get_mut(segment_id).ok_or_else(|| StoreError::not_found("track_segment", segment_id))?;
        segment.is_assigned = occupied;
        Ok(())
    }

    async fn insert_route_assignment(&self, route: NewRouteAssignment) -> Result<RouteAssignment, StoreError> {
        let mut state = self.inner.lock().unwrap();
        state.next_route_id += 1;
        let id = format!("ROUTE_{}", state.next_route_id);
        let now = chrono::Utc::now();
        let assignment = RouteAssignment {
            id: id.clone(),
            source_signal: route.source_signal,
            dest_signal: route.dest_signal,
            direction: route.direction,
            assigned_circuits: route.assigned_circuits,
            overlap_circuits: route.overlap_circuits,
            locked_point_machines: route.locked_point_machines,
            state: RouteState::Reserved,
            priority: route.priority,
            operator_id: route.operator_id,
            created_at: now,
            updated_at: now,
            failure_reason: None,
            performance_metrics: None,
        };
        state.routes.insert(id, assignment.clone());
        Ok(assignment)
    }

    async fn update_route_state(&self, route_id: &RouteId, new_state: RouteState, _operator_id: &str, reason: Option<&str>) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let route = state.routes.get_mut(route_id).ok_or_else(|| StoreError::not_found("route_assignment", route_id))?;
        route.state = new_state;
        route.failure_reason = reason.map(str::to_string);
        Ok(())
    }

    async fn update_route_performance_metrics(&self, route_id: &RouteId, metrics: serde_json::Value) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let route = state.routes.get_mut(route_id).ok_or_else(|| StoreError::not_found("route_assignment", route_id))?;
        route.performance_metrics = Some(metrics);
        Ok(())
    }

    async fn delete_route_assignment(&self, route_id: &RouteId, force_delete: bool) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let route = state.routes.get(route_id).ok_or_else(|| StoreError::not_found("route_assignment", route_id))?;
        if !force_delete && route.is_non_terminal() {
            return Err(StoreError::ProcedureRejected(format!("route {route_id} is not terminal; pass force_delete to override")));
        }
        state.routes.remove(route_id);
        Ok(())
    }

    async fn insert_route_event(&self, event: NewRouteEvent) -> Result<RouteEvent, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let seq = state.route_events.get(&event.route_id).map(|events| events.len() as i64 + 1).unwrap_or(1);
        let record = RouteEvent {
            seq,
            route_id: event.route_id.clone(),
            event_type: event.event_type,
            timestamp: chrono::Utc::now(),
            payload: event.payload,
            operator_id: event.operator_id,
            source: event.source,
            correlation_id: event.correlation_id,
            response_time_ms: event.response_time_ms,
            safety_critical: event.safety_critical,
        };
        state.route_events.entry(event.route_id).or_default().push(record.clone());
        Ok(record)
    }

    async fn acquire_resource_lock(&self, lock: NewResourceLock) -> Result<ResourceLock, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let conflict = state.resource_locks.iter().any(|l| {
            l.is_active
                && l.resource_type == lock.resource_type
                && l.resource_id == lock.resource_id
                && !matches!(lock.lock_type, signalbox_model::LockType::Overlap)
        });
        if conflict {
            return Err(StoreError::ProcedureRejected(format!("resource {} already locked", lock.resource_id)));
        }
        let record = ResourceLock {
            resource_type: lock.resource_type,
            resource_id: lock.resource_id,
            route_id: lock.route_id,
            lock_type: lock.lock_type,
            acquired_at: chrono::Utc::now(),
            is_active: true,
        };
        state.resource_locks.push(record.clone());
        Ok(record)
    }

    async fn release_resource_locks(&self, route_id: &RouteId) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let mut count = 0;
        for lock in state.resource_locks.iter_mut().filter(|l| &l.route_id == route_id && l.is_active) {
            lock.is_active = false;
            count += 1;
        }
        Ok(count)
    }

    async fn release_overlap_locks(&self, route_id: &RouteId) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let mut count = 0;
        for lock in state
            .resource_locks
            .iter_mut()
            .filter(|l| &l.route_id == route_id && l.is_active && l.lock_type == signalbox_model::LockType::Overlap)
        {
            lock.is_active = false;
            count += 1;
        }
        Ok(count)
    }

    async fn subscribe(&self, _channel_name: &str) -> Result<BoxStream<'static, Result<Notification, StoreError>>, StoreError> {
        Ok(stream::empty().boxed())
    }
}
