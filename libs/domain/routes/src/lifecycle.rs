//! Request, activation, release and resource-conflict validation (§4.7).

use crate::errors::RouteError;
use signalbox_model::{BlockReason, Direction, LockType, MainAspect, Outcome, ResourceLock, ResourceType, RouteState};
use signalbox_rules::{RuleContext, RuleEngine};
use signalbox_store::{StoreError, StoreGateway};
use tracing::instrument;

fn blocked(err: RouteError) -> Outcome<()> {
    Outcome::Blocked(BlockReason::new(err.rule_id(), err.to_string()))
}

/// `validate_route_request(src, dst, direction, path, operator)` of §4.7.
#[instrument(skip(gateway))]
pub async fn validate_route_request<G: StoreGateway>(
    gateway: &G,
    src_signal: &str,
    dst_signal: &str,
    _direction: Direction,
    path: &[String],
) -> Result<Outcome<()>, StoreError> {
    for signal_id in [src_signal, dst_signal] {
        if let Err(StoreError::NotFound { .. }) = gateway.get_signal(signal_id).await {
            return Ok(blocked(RouteError::SignalNotFound(signal_id.to_string())));
        }
    }

    for circuit_id in path {
        let circuit = match gateway.get_track_circuit(circuit_id).await {
            Ok(circuit) => circuit,
            Err(StoreError::NotFound { .. }) => return Ok(blocked(RouteError::CircuitNotFound(circuit_id.clone()))),
            Err(other) => return Err(other),
        };
        if circuit.is_occupied {
            return Ok(blocked(RouteError::CircuitOccupied(circuit_id.clone())));
        }
    }

    for route in gateway.list_active_routes().await? {
        if route.assigned_circuits.iter().any(|assigned| path.contains(assigned)) {
            let conflicting = route.assigned_circuits.iter().find(|assigned| path.contains(assigned)).cloned().unwrap_or_default();
            return Ok(blocked(RouteError::CircuitOverlapsActiveRoute(conflicting)));
        }
    }

    Ok(Outcome::Allowed(()))
}

/// `validate_route_activation(route, assigned_circuits, locked_machines, operator)` of §4.7.
#[instrument(skip(gateway, rules, ctx))]
pub async fn validate_route_activation<G: StoreGateway>(
    gateway: &G,
    rules: &RuleEngine,
    ctx: &RuleContext,
    route_id: &str,
    operator_id: &str,
) -> Result<Outcome<()>, StoreError> {
    let route = match gateway.get_route_assignment(route_id).await {
        Ok(route) => route,
        Err(StoreError::NotFound { .. }) => return Ok(blocked(RouteError::RouteNotFound(route_id.to_string()))),
        Err(other) => return Err(other),
    };

    if !route.state.can_transition_to(RouteState::Active) {
        return Ok(blocked(RouteError::RouteNotReserved));
    }

    for circuit_id in &route.assigned_circuits {
        if gateway.get_track_circuit(circuit_id).await?.is_occupied {
            return Ok(blocked(RouteError::AssignedCircuitOccupied(circuit_id.clone())));
        }
    }

    let clear_outcome = signalbox_validation::validate_main_aspect_change(gateway, rules, ctx, &route.source_signal, MainAspect::Green).await?;
    if let Outcome::Blocked(reason) = clear_outcome {
        return Ok(blocked(RouteError::SourceSignalNotClearable(reason.message)));
    }

    tracing::debug!(route_id, operator_id, "route activation validated");
    Ok(Outcome::Allowed(()))
}

/// `validate_route_release(route, assigned_circuits, reason, operator)` of §4.7.
///
/// `reason == Some("EMERGENCY_RELEASE")` bypasses occupancy and signal
/// restoration checks, the designated escape hatch for emergency releases.
#[instrument(skip(gateway, rules, ctx))]
pub async fn validate_route_release<G: StoreGateway>(
    gateway: &G,
    rules: &RuleEngine,
    ctx: &RuleContext,
    route_id: &str,
    reason: Option<&str>,
) -> Result<Outcome<()>, StoreError> {
    let route = match gateway.get_route_assignment(route_id).await {
        Ok(route) => route,
        Err(StoreError::NotFound { .. }) => return Ok(blocked(RouteError::RouteNotFound(route_id.to_string()))),
        Err(other) => return Err(other),
    };

    if !route.state.can_transition_to(RouteState::Released) {
        return Ok(blocked(RouteError::InvalidStateTransition { from: route.state, to: RouteState::Released }));
    }

    if reason == Some("EMERGENCY_RELEASE") {
        return Ok(Outcome::Allowed(()));
    }

    for circuit_id in &route.assigned_circuits {
        if gateway.get_track_circuit(circuit_id).await?.is_occupied {
            return Ok(blocked(RouteError::AssignedCircuitOccupied(circuit_id.clone())));
        }
    }

    let restore_outcome = signalbox_validation::validate_main_aspect_change(gateway, rules, ctx, &route.source_signal, MainAspect::Red).await?;
    if let Outcome::Blocked(reason) = restore_outcome {
        return Ok(blocked(RouteError::SourceSignalNotRestorable(reason.message)));
    }

    Ok(Outcome::Allowed(()))
}

/// `validate_route_partial_release(route, operator)` of §4.7:
/// `ACTIVE -> PARTIALLY_RELEASED`, freeing the overlap protection zone ahead
/// of the full release.
#[instrument(skip(gateway))]
pub async fn validate_route_partial_release<G: StoreGateway>(gateway: &G, route_id: &str) -> Result<Outcome<()>, StoreError> {
    let route = match gateway.get_route_assignment(route_id).await {
        Ok(route) => route,
        Err(StoreError::NotFound { .. }) => return Ok(blocked(RouteError::RouteNotFound(route_id.to_string()))),
        Err(other) => return Err(other),
    };

    if !route.state.can_transition_to(RouteState::PartiallyReleased) {
        return Ok(blocked(RouteError::InvalidStateTransition { from: route.state, to: RouteState::PartiallyReleased }));
    }

    Ok(Outcome::Allowed(()))
}

/// `validate_resource_conflict(type, id, requesting_route, existing_locks)` of §4.7.
pub fn validate_resource_conflict(resource_type: ResourceType, requesting_route: &str, existing_locks: &[ResourceLock]) -> Outcome<()> {
    for lock in existing_locks {
        if !lock.is_active || lock.route_id == requesting_route {
            continue;
        }
        let conflicts = match lock.lock_type {
            LockType::Route | LockType::Emergency | LockType::Maintenance => true,
            LockType::Overlap => resource_type == ResourceType::TrackCircuit,
        };
        if conflicts {
            return blocked(RouteError::ResourceConflict { resource_id: lock.resource_id.clone() });
        }
    }
    Outcome::Allowed(())
}
