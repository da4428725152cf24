//! Route creation, activation, release and deletion, composed from
//! `lifecycle` validation plus the store's stored-procedure mutators.
//!
//! Every meaningful action appends to the route-event journal (§4.7);
//! `safety_critical` events are re-read after commit to confirm persistence.

use crate::errors::RouteError;
use crate::lifecycle;
use signalbox_model::{BlockReason, Direction, LockType, MainAspect, Outcome, ResourceType, RouteAssignment, RouteEventType, RouteState};
use signalbox_rules::{RuleContext, RuleEngine};
use signalbox_store::{NewResourceLock, NewRouteAssignment, NewRouteEvent, StoreError, StoreGateway};
use tracing::instrument;

fn blocked(err: RouteError) -> Outcome<()> {
    Outcome::Blocked(BlockReason::new(err.rule_id(), err.to_string()))
}

async fn journal<G: StoreGateway>(
    gateway: &G,
    route_id: &str,
    event_type: RouteEventType,
    operator_id: &str,
    payload: serde_json::Value,
    safety_critical: bool,
) -> Result<(), StoreError> {
    let event = gateway
        .insert_route_event(NewRouteEvent {
            route_id: route_id.to_string(),
            event_type,
            payload,
            operator_id: operator_id.to_string(),
            source: "signalbox-routes".to_string(),
            correlation_id: None,
            response_time_ms: None,
            safety_critical,
        })
        .await?;

    if safety_critical {
        // Re-read to confirm the safety-critical entry actually persisted,
        // per §4.7's "safety_critical events are re-read after commit".
        let persisted = gateway.get_route_assignment(route_id).await;
        if persisted.is_err() {
            tracing::error!(route_id, seq = event.seq, "route vanished immediately after a safety-critical event was journaled");
        }
    }
    Ok(())
}

/// Creates a route in RESERVED state after running `validate_route_request`.
#[instrument(skip(gateway))]
pub async fn create_route<G: StoreGateway>(
    gateway: &G,
    src_signal: &str,
    dst_signal: &str,
    direction: Direction,
    path: Vec<String>,
    priority: i32,
    operator_id: &str,
) -> Result<Outcome<RouteAssignment>, StoreError> {
    match lifecycle::validate_route_request(gateway, src_signal, dst_signal, direction, &path).await? {
        Outcome::Blocked(reason) => return Ok(Outcome::Blocked(reason)),
        Outcome::Allowed(()) => {}
    }

    let route = gateway
        .insert_route_assignment(NewRouteAssignment {
            source_signal: src_signal.to_string(),
            dest_signal: dst_signal.to_string(),
            direction,
            assigned_circuits: path,
            overlap_circuits: vec![],
            locked_point_machines: vec![],
            priority,
            operator_id: operator_id.to_string(),
        })
        .await?;

    journal(gateway, &route.id, RouteEventType::Created, operator_id, serde_json::json!({ "source_signal": src_signal, "dest_signal": dst_signal }), false).await?;

    Ok(Outcome::Allowed(route))
}

/// Acquires a resource lock for `route_id` over `resource_id`, checking for
/// conflicts against the resource's existing active locks first (§4.7).
///
/// A point machine additionally inherits its paired machine's ROUTE/
/// EMERGENCY/MAINTENANCE locks (§4.7: "Point machines inherit their paired
/// machine's conflicts"), since two physically coupled machines can't be
/// reserved by different routes even when only one of them is the named
/// resource.
#[instrument(skip(gateway))]
pub async fn acquire_lock<G: StoreGateway>(
    gateway: &G,
    resource_type: ResourceType,
    resource_id: &str,
    route_id: &str,
    lock_type: LockType,
) -> Result<Outcome<()>, StoreError> {
    let mut existing = gateway.list_resource_locks_for(resource_type, resource_id).await?;
    if resource_type == ResourceType::PointMachine {
        if let Ok(machine) = gateway.get_point_machine(resource_id).await {
            if let Some(paired_id) = &machine.paired_entity {
                let paired_locks = gateway.list_resource_locks_for(ResourceType::PointMachine, paired_id).await?;
                existing.extend(
                    paired_locks.into_iter().filter(|lock| matches!(lock.lock_type, LockType::Route | LockType::Emergency | LockType::Maintenance)),
                );
            }
        }
    }
    if let Outcome::Blocked(reason) = lifecycle::validate_resource_conflict(resource_type, route_id, &existing) {
        return Ok(Outcome::Blocked(reason));
    }

    gateway
        .acquire_resource_lock(NewResourceLock { resource_type, resource_id: resource_id.to_string(), route_id: route_id.to_string(), lock_type })
        .await?;

    journal(gateway, route_id, RouteEventType::LockAcquired, "system", serde_json::json!({ "resource_type": resource_type.to_string(), "resource_id": resource_id }), false).await?;

    Ok(Outcome::Allowed(()))
}

/// Validates and performs `RESERVED -> ACTIVE`, clearing the source signal
/// to GREEN as part of the same logical operation.
#[instrument(skip(gateway, rules, ctx))]
pub async fn activate_route<G: StoreGateway>(
    gateway: &G,
    rules: &RuleEngine,
    ctx: &RuleContext,
    route_id: &str,
    operator_id: &str,
) -> Result<Outcome<()>, StoreError> {
    if let Outcome::Blocked(reason) = lifecycle::validate_route_activation(gateway, rules, ctx, route_id, operator_id).await? {
        return Ok(Outcome::Blocked(reason));
    }

    let route = gateway.get_route_assignment(route_id).await?;
    gateway.update_signal_aspect(&route.source_signal, MainAspect::Green, operator_id).await?;
    gateway.update_route_state(route_id, RouteState::Active, operator_id, None).await?;
    journal(gateway, route_id, RouteEventType::Activated, operator_id, serde_json::json!({}), false).await?;

    Ok(Outcome::Allowed(()))
}

/// Validates and performs the final release (`ACTIVE|PARTIALLY_RELEASED ->
/// RELEASED`), restoring the source signal to RED unless
/// `reason == Some("EMERGENCY_RELEASE")`. For the intermediate
/// `ACTIVE -> PARTIALLY_RELEASED` step, see `partial_release_route`.
#[instrument(skip(gateway, rules, ctx))]
pub async fn release_route<G: StoreGateway>(
    gateway: &G,
    rules: &RuleEngine,
    ctx: &RuleContext,
    route_id: &str,
    reason: Option<&str>,
    operator_id: &str,
) -> Result<Outcome<()>, StoreError> {
    if let Outcome::Blocked(block_reason) = lifecycle::validate_route_release(gateway, rules, ctx, route_id, reason).await? {
        return Ok(Outcome::Blocked(block_reason));
    }

    let route = gateway.get_route_assignment(route_id).await?;
    if reason != Some("EMERGENCY_RELEASE") {
        gateway.update_signal_aspect(&route.source_signal, MainAspect::Red, operator_id).await?;
    }

    gateway.update_route_state(route_id, RouteState::Released, operator_id, reason).await?;
    let released = gateway.release_resource_locks(route_id).await?;
    if released > 0 {
        journal(gateway, route_id, RouteEventType::LockReleased, operator_id, serde_json::json!({ "locks_released": released }), false).await?;
    }
    journal(
        gateway,
        route_id,
        RouteEventType::Released,
        operator_id,
        serde_json::json!({ "reason": reason }),
        reason == Some("EMERGENCY_RELEASE"),
    )
    .await?;

    Ok(Outcome::Allowed(()))
}

/// Validates and performs `ACTIVE -> PARTIALLY_RELEASED`, freeing the
/// route's overlap protection zone ahead of a full release.
#[instrument(skip(gateway))]
pub async fn partial_release_route<G: StoreGateway>(gateway: &G, route_id: &str, operator_id: &str) -> Result<Outcome<()>, StoreError> {
    if let Outcome::Blocked(reason) = lifecycle::validate_route_partial_release(gateway, route_id).await? {
        return Ok(Outcome::Blocked(reason));
    }

    gateway.update_route_state(route_id, RouteState::PartiallyReleased, operator_id, None).await?;
    let released = gateway.release_overlap_locks(route_id).await?;
    if released > 0 {
        journal(gateway, route_id, RouteEventType::LockReleased, operator_id, serde_json::json!({ "locks_released": released }), false).await?;
    }
    journal(gateway, route_id, RouteEventType::PartiallyReleased, operator_id, serde_json::json!({}), false).await?;

    Ok(Outcome::Allowed(()))
}

/// Moves a route directly to FAILED, e.g. on an interlocking failure
/// upstream in the Track-Circuit Branch. Only `RESERVED`/`ACTIVE` routes can
/// fail (§4.7's state machine); anything else is rejected rather than
/// silently re-journaled.
#[instrument(skip(gateway))]
pub async fn fail_route<G: StoreGateway>(gateway: &G, route_id: &str, reason: &str, operator_id: &str) -> Result<Outcome<()>, StoreError> {
    let route = match gateway.get_route_assignment(route_id).await {
        Ok(route) => route,
        Err(StoreError::NotFound { .. }) => return Ok(blocked(RouteError::RouteNotFound(route_id.to_string()))),
        Err(other) => return Err(other),
    };
    if !route.state.can_transition_to(RouteState::Failed) {
        return Ok(blocked(RouteError::InvalidStateTransition { from: route.state, to: RouteState::Failed }));
    }

    gateway.update_route_state(route_id, RouteState::Failed, operator_id, Some(reason)).await?;
    gateway.release_resource_locks(route_id).await?;
    journal(gateway, route_id, RouteEventType::Failed, operator_id, serde_json::json!({ "reason": reason }), true).await?;
    Ok(Outcome::Allowed(()))
}

/// Deletes a route record. Deleting a non-terminal route requires
/// `force_delete`; deleting one in a terminal state never does.
#[instrument(skip(gateway))]
pub async fn delete_route<G: StoreGateway>(gateway: &G, route_id: &str, force_delete: bool, operator_id: &str) -> Result<Outcome<()>, StoreError> {
    let route = match gateway.get_route_assignment(route_id).await {
        Ok(route) => route,
        Err(StoreError::NotFound { .. }) => return Ok(blocked(RouteError::RouteNotFound(route_id.to_string()))),
        Err(other) => return Err(other),
    };

    if route.is_non_terminal() && !force_delete {
        return Ok(blocked(RouteError::ForceDeleteRequired));
    }

    journal(gateway, route_id, RouteEventType::Deleted, operator_id, serde_json::json!({ "force_delete": force_delete }), route.is_non_terminal()).await?;
    gateway.delete_route_assignment(route_id, force_delete).await?;
    Ok(Outcome::Allowed(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbox_model::{CallingOnAspect, LoopAspect, Signal, SignalType};
    use signalbox_rules::RuleDocument;
    use signalbox_store::InMemoryStoreGateway;
    use std::collections::HashSet;

    fn signal(id: &str) -> Signal {
        Signal {
            signal_id: id.to_string(),
            signal_type: SignalType::Home,
            main_aspect: MainAspect::Red,
            calling_on_aspect: CallingOnAspect::Off,
            loop_aspect: LoopAspect::Off,
            is_locked: false,
            is_active: true,
            possible_aspects: HashSet::from([MainAspect::Red, MainAspect::Green]),
            protected_track_circuits: vec![],
            interlocked_with: vec![],
        }
    }

    fn independent_engine(signal_id: &str) -> RuleEngine {
        let mut doc = RuleDocument::new();
        doc.insert(
            signal_id.to_string(),
            signalbox_model::SignalRuleConfig { independent: true, control_mode: signalbox_model::ControlMode::And, controlled_by: vec![], rules: vec![] },
        );
        RuleEngine::new(doc)
    }

    #[tokio::test]
    async fn create_then_activate_then_release() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(signal("SIG1"));
        gateway.seed_signal(signal("SIG2"));

        let created = create_route(&gateway, "SIG1", "SIG2", Direction::Up, vec![], 0, "op1").await.unwrap();
        let route = match created {
            Outcome::Allowed(route) => route,
            Outcome::Blocked(reason) => panic!("unexpected block: {reason:?}"),
        };
        assert_eq!(route.state, RouteState::Reserved);

        let rules = independent_engine("SIG1");
        let ctx = RuleContext::new();
        let activated = activate_route(&gateway, &rules, &ctx, &route.id, "op1").await.unwrap();
        assert!(activated.is_allowed());
        assert_eq!(gateway.get_route_assignment(&route.id).await.unwrap().state, RouteState::Active);
        assert_eq!(gateway.get_signal("SIG1").await.unwrap().main_aspect, MainAspect::Green);

        let released = release_route(&gateway, &rules, &ctx, &route.id, None, "op1").await.unwrap();
        assert!(released.is_allowed());
        assert_eq!(gateway.get_route_assignment(&route.id).await.unwrap().state, RouteState::Released);
        assert_eq!(gateway.get_signal("SIG1").await.unwrap().main_aspect, MainAspect::Red);
    }

    #[tokio::test]
    async fn deleting_active_route_without_force_is_blocked() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(signal("SIG1"));
        gateway.seed_signal(signal("SIG2"));
        let route = match create_route(&gateway, "SIG1", "SIG2", Direction::Up, vec![], 0, "op1").await.unwrap() {
            Outcome::Allowed(route) => route,
            Outcome::Blocked(reason) => panic!("unexpected block: {reason:?}"),
        };

        let outcome = delete_route(&gateway, &route.id, false, "op1").await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "FORCE_DELETE_REQUIRED");

        let outcome = delete_route(&gateway, &route.id, true, "op1").await.unwrap();
        assert!(outcome.is_allowed());
        assert!(matches!(gateway.get_route_assignment(&route.id).await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn point_machine_lock_blocked_by_paired_machines_route_lock() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_point_machine(signalbox_model::PointMachine {
            machine_id: "PM1".to_string(),
            current_position: signalbox_model::PointPosition::Normal,
            operating_status: signalbox_model::OperatingStatus::Available,
            paired_entity: Some("PM2".to_string()),
            host_track_circuit: "C_HOST".to_string(),
            is_locked: false,
            time_lock_expires_at: None,
            protected_signals: vec![],
            detection_locking_circuits: vec![],
            conflicting_machines: vec![],
            root_segment: "SEG_ROOT".to_string(),
            normal_segment: "SEG_N".to_string(),
            reverse_segment: "SEG_R".to_string(),
        });

        gateway
            .acquire_resource_lock(NewResourceLock {
                resource_type: ResourceType::PointMachine,
                resource_id: "PM2".to_string(),
                route_id: "ROUTE_A".to_string(),
                lock_type: LockType::Route,
            })
            .await
            .unwrap();

        let outcome = acquire_lock(&gateway, ResourceType::PointMachine, "PM1", "ROUTE_B", LockType::Route).await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "RESOURCE_CONFLICT");

        let same_route = acquire_lock(&gateway, ResourceType::PointMachine, "PM1", "ROUTE_A", LockType::Route).await.unwrap();
        assert!(same_route.is_allowed(), "the requesting route's own lock on the paired machine is not a conflict");
    }

    #[tokio::test]
    async fn partial_release_then_release_reaches_released() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(signal("SIG1"));
        gateway.seed_signal(signal("SIG2"));
        let route = match create_route(&gateway, "SIG1", "SIG2", Direction::Up, vec![], 0, "op1").await.unwrap() {
            Outcome::Allowed(route) => route,
            Outcome::Blocked(reason) => panic!("unexpected block: {reason:?}"),
        };
        gateway
            .acquire_resource_lock(NewResourceLock {
                resource_type: ResourceType::TrackCircuit,
                resource_id: "C_OVERLAP".to_string(),
                route_id: route.id.clone(),
                lock_type: LockType::Overlap,
            })
            .await
            .unwrap();

        let rules = independent_engine("SIG1");
        let ctx = RuleContext::new();
        activate_route(&gateway, &rules, &ctx, &route.id, "op1").await.unwrap();

        let partial = partial_release_route(&gateway, &route.id, "op1").await.unwrap();
        assert!(partial.is_allowed());
        assert_eq!(gateway.get_route_assignment(&route.id).await.unwrap().state, RouteState::PartiallyReleased);
        assert!(gateway.list_resource_locks_for(ResourceType::TrackCircuit, "C_OVERLAP").await.unwrap().iter().all(|lock| !lock.is_active));

        let released = release_route(&gateway, &rules, &ctx, &route.id, None, "op1").await.unwrap();
        assert!(released.is_allowed());
        assert_eq!(gateway.get_route_assignment(&route.id).await.unwrap().state, RouteState::Released);
    }

    #[tokio::test]
    async fn partial_release_is_blocked_before_activation() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(signal("SIG1"));
        gateway.seed_signal(signal("SIG2"));
        let route = match create_route(&gateway, "SIG1", "SIG2", Direction::Up, vec![], 0, "op1").await.unwrap() {
            Outcome::Allowed(route) => route,
            Outcome::Blocked(reason) => panic!("unexpected block: {reason:?}"),
        };

        let outcome = partial_release_route(&gateway, &route.id, "op1").await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "INVALID_STATE_TRANSITION");
    }

    #[tokio::test]
    async fn failing_a_released_route_is_rejected() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(signal("SIG1"));
        gateway.seed_signal(signal("SIG2"));
        let route = match create_route(&gateway, "SIG1", "SIG2", Direction::Up, vec![], 0, "op1").await.unwrap() {
            Outcome::Allowed(route) => route,
            Outcome::Blocked(reason) => panic!("unexpected block: {reason:?}"),
        };
        let rules = independent_engine("SIG1");
        let ctx = RuleContext::new();
        activate_route(&gateway, &rules, &ctx, &route.id, "op1").await.unwrap();
        release_route(&gateway, &rules, &ctx, &route.id, None, "op1").await.unwrap();

        let outcome = fail_route(&gateway, &route.id, "TEST_FAILURE", "op1").await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "INVALID_STATE_TRANSITION");
        assert_eq!(gateway.get_route_assignment(&route.id).await.unwrap().state, RouteState::Released);
    }
}
