//! Point-Machine Branch (§4.5): single and paired position-change validation.

use crate::errors::ValidationError;
use signalbox_model::{BlockReason, MainAspect, OperatingStatus, Outcome, PointMachine, PointPosition, ResourceType, RouteState};
use signalbox_store::{StoreError, StoreGateway};
use tracing::instrument;

fn blocked(err: ValidationError) -> Outcome<()> {
    Outcome::Blocked(BlockReason::new(err.rule_id(), err.to_string()))
}

/// `validate_position_change(machine, current, requested, operator)` of §4.5.
#[instrument(skip(gateway))]
pub async fn validate_position_change<G: StoreGateway>(gateway: &G, machine_id: &str, requested: PointPosition, _operator_id: &str) -> Result<Outcome<()>, StoreError> {
    let machine = match gateway.get_point_machine(machine_id).await {
        Ok(machine) => machine,
        Err(StoreError::NotFound { .. }) => return Ok(blocked(ValidationError::PointMachineNotFound(machine_id.to_string()))),
        Err(other) => return Err(other),
    };

    single_machine_checks(gateway, &machine, requested).await
}

async fn single_machine_checks<G: StoreGateway>(gateway: &G, machine: &PointMachine, requested: PointPosition) -> Result<Outcome<()>, StoreError> {
    if machine.current_position == requested {
        return Ok(Outcome::Allowed(()));
    }

    if machine.operating_status != OperatingStatus::Available {
        return Ok(blocked(ValidationError::OperatingStatusNotAvailable));
    }

    if machine.is_locked {
        return Ok(blocked(ValidationError::PointMachineLocked));
    }

    if machine.time_lock_active(chrono::Utc::now()) {
        return Ok(blocked(ValidationError::TimeLockActive));
    }

    for circuit_id in &machine.detection_locking_circuits {
        if gateway.get_track_circuit(circuit_id).await?.is_occupied {
            return Ok(blocked(ValidationError::DetectionLockOccupied));
        }
    }

    let mut non_red = Vec::new();
    for signal_id in &machine.protected_signals {
        let signal = gateway.get_signal(signal_id).await?;
        if signal.main_aspect != MainAspect::Red {
            non_red.push(signal_id.clone());
        }
    }
    if !non_red.is_empty() {
        return Ok(Outcome::Blocked(
            BlockReason::new(ValidationError::ProtectingSignalsNotRed.rule_id(), format!("protecting signals not RED: {non_red:?}")).with_entities(non_red),
        ));
    }

    if let Some(outcome) = check_segments_unoccupied(gateway, machine.affected_segments(requested).into_iter().cloned().collect()).await? {
        return Ok(outcome);
    }

    for conflicting_id in &machine.conflicting_machines {
        let conflicting = gateway.get_point_machine(conflicting_id).await?;
        if conflicting.current_position != PointPosition::Normal {
            return Ok(Outcome::Blocked(
                BlockReason::new(ValidationError::ConflictingMachineNotNormal.rule_id(), format!("{conflicting_id} is not NORMAL"))
                    .with_entities([conflicting_id.clone()]),
            ));
        }
    }

    if route_conflict(gateway, &machine.machine_id).await? {
        return Ok(blocked(ValidationError::RouteConflict));
    }

    Ok(Outcome::Allowed(()))
}

async fn check_segments_unoccupied<G: StoreGateway>(gateway: &G, segments: Vec<String>) -> Result<Option<Outcome<()>>, StoreError> {
    let mut occupied = Vec::new();
    for segment_id in segments {
        if gateway.get_track_circuit_by_segment(&segment_id).await?.is_occupied {
            occupied.push(segment_id);
        }
    }
    if occupied.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Outcome::Blocked(
            BlockReason::new(ValidationError::AffectedSegmentOccupied.rule_id(), format!("affected segments occupied: {occupied:?}")).with_entities(occupied),
        )))
    }
}

async fn route_conflict<G: StoreGateway>(gateway: &G, machine_id: &str) -> Result<bool, StoreError> {
    for lock in gateway.list_resource_locks_for(ResourceType::PointMachine, machine_id).await? {
        let route = gateway.get_route_assignment(&lock.route_id).await?;
        if matches!(route.state, RouteState::Active | RouteState::Reserved) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `validate_paired_operation(m, paired, cur, paired_cur, requested, operator)` of §4.5.
///
/// Both machines move to the same `requested` position (§3's pairing
/// invariant: a settled pair always agrees), not opposite positions.
#[instrument(skip(gateway))]
pub async fn validate_paired_operation<G: StoreGateway>(
    gateway: &G,
    machine_id: &str,
    paired_id: &str,
    requested: PointPosition,
    operator_id: &str,
) -> Result<Outcome<()>, StoreError> {
    let primary_outcome = validate_position_change(gateway, machine_id, requested, operator_id).await?;
    if !primary_outcome.is_allowed() {
        return Ok(primary_outcome);
    }
    let paired_outcome = validate_position_change(gateway, paired_id, requested, operator_id).await?;
    if !paired_outcome.is_allowed() {
        return Ok(paired_outcome);
    }

    let machine = gateway.get_point_machine(machine_id).await?;
    let paired = gateway.get_point_machine(paired_id).await?;

    let mut combined_segments: Vec<String> = machine.affected_segments(requested).into_iter().cloned().collect();
    combined_segments.extend(paired.affected_segments(requested).into_iter().cloned());
    combined_segments.sort();
    combined_segments.dedup();

    if let Some(outcome) = check_segments_unoccupied(gateway, combined_segments).await? {
        return Ok(outcome);
    }

    let mut combined_conflicts: Vec<String> = machine
        .conflicting_machines
        .iter()
        .chain(paired.conflicting_machines.iter())
        .filter(|id| *id != &machine.machine_id && *id != &paired.machine_id)
        .cloned()
        .collect();
    combined_conflicts.sort();
    combined_conflicts.dedup();

    for conflicting_id in combined_conflicts {
        let conflicting = gateway.get_point_machine(&conflicting_id).await?;
        if conflicting.current_position == PointPosition::Reverse {
            return Ok(Outcome::Blocked(
                BlockReason::new(ValidationError::ConflictingMachineNotNormal.rule_id(), format!("{conflicting_id} is REVERSE")).with_entities([conflicting_id]),
            ));
        }
    }

    Ok(Outcome::Allowed(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbox_store::InMemoryStoreGateway;

    fn sample_machine(id: &str, position: PointPosition) -> PointMachine {
        PointMachine {
            machine_id: id.to_string(),
            current_position: position,
            operating_status: OperatingStatus::Available,
            paired_entity: None,
            host_track_circuit: "C_HOST".to_string(),
            is_locked: false,
            time_lock_expires_at: None,
            protected_signals: vec![],
            detection_locking_circuits: vec![],
            conflicting_machines: vec![],
            root_segment: "SEG_ROOT".to_string(),
            normal_segment: "SEG_N".to_string(),
            reverse_segment: "SEG_R".to_string(),
        }
    }

    #[tokio::test]
    async fn no_op_move_is_allowed() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_point_machine(sample_machine("PM1", PointPosition::Normal));
        let outcome = validate_position_change(&gateway, "PM1", PointPosition::Normal, "op1").await.unwrap();
        assert!(outcome.is_allowed());
    }

    #[tokio::test]
    async fn non_available_status_blocks() {
        let gateway = InMemoryStoreGateway::new();
        let mut machine = sample_machine("PM1", PointPosition::Normal);
        machine.operating_status = OperatingStatus::Failed;
        gateway.seed_point_machine(machine);
        let outcome = validate_position_change(&gateway, "PM1", PointPosition::Reverse, "op1").await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "OPERATING_STATUS_NOT_AVAILABLE");
    }

    #[tokio::test]
    async fn locked_machine_blocks() {
        let gateway = InMemoryStoreGateway::new();
        let mut machine = sample_machine("PM1", PointPosition::Normal);
        machine.is_locked = true;
        gateway.seed_point_machine(machine);
        let outcome = validate_position_change(&gateway, "PM1", PointPosition::Reverse, "op1").await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "POINT_MACHINE_LOCKED");
    }

    #[tokio::test]
    async fn unsettled_protecting_signal_blocks() {
        let gateway = InMemoryStoreGateway::new();
        let mut machine = sample_machine("PM1", PointPosition::Normal);
        machine.protected_signals = vec!["SIG1".to_string()];
        gateway.seed_point_machine(machine);
        gateway.seed_signal(signalbox_model::Signal {
            signal_id: "SIG1".to_string(),
            signal_type: signalbox_model::SignalType::Home,
            main_aspect: MainAspect::Green,
            calling_on_aspect: signalbox_model::CallingOnAspect::Off,
            loop_aspect: signalbox_model::LoopAspect::Off,
            is_locked: false,
            is_active: true,
            possible_aspects: [MainAspect::Red, MainAspect::Green].into_iter().collect(),
            protected_track_circuits: vec![],
            interlocked_with: vec![],
        });
        let outcome = validate_position_change(&gateway, "PM1", PointPosition::Reverse, "op1").await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "PROTECTING_SIGNALS_NOT_RED");
    }

    #[tokio::test]
    async fn paired_move_requires_both_machines_clear() {
        let gateway = InMemoryStoreGateway::new();
        let mut a = sample_machine("PM1", PointPosition::Normal);
        a.paired_entity = Some("PM2".to_string());
        let mut b = sample_machine("PM2", PointPosition::Normal);
        b.paired_entity = Some("PM1".to_string());
        b.operating_status = OperatingStatus::LockedOut;
        gateway.seed_point_machine(a);
        gateway.seed_point_machine(b);
        let outcome = validate_paired_operation(&gateway, "PM1", "PM2", PointPosition::Reverse, "op1").await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "OPERATING_STATUS_NOT_AVAILABLE");
    }

    fn seed_segment(gateway: &InMemoryStoreGateway, segment_id: &str, circuit_id: &str, occupied: bool) {
        gateway.seed_track_circuit(signalbox_model::TrackCircuit {
            circuit_id: circuit_id.to_string(),
            is_occupied: occupied,
            occupied_by: if occupied { Some("TRAIN_1".to_string()) } else { None },
            is_assigned: false,
            is_overlap: false,
            protecting_signals: vec![],
        });
        gateway.seed_track_segment(signalbox_model::TrackSegment {
            segment_id: segment_id.to_string(),
            circuit_id: circuit_id.to_string(),
            is_assigned: false,
            is_overlap: false,
            protecting_signals: vec![],
        });
    }

    /// A paired move onto REVERSE must check the paired machine's own
    /// REVERSE-side connection, not its NORMAL-side one: with the
    /// `requested.opposite()` bug this occupied segment would never be
    /// consulted and the move would wrongly be allowed.
    #[tokio::test]
    async fn paired_operation_blocks_on_paired_machines_requested_side_segment() {
        let gateway = InMemoryStoreGateway::new();
        let mut a = sample_machine("PM1", PointPosition::Normal);
        a.paired_entity = Some("PM2".to_string());
        let mut b = sample_machine("PM2", PointPosition::Normal);
        b.paired_entity = Some("PM1".to_string());
        b.root_segment = "SEG_ROOT_2".to_string();
        b.normal_segment = "SEG_N_2".to_string();
        b.reverse_segment = "SEG_R_2".to_string();
        gateway.seed_point_machine(a);
        gateway.seed_point_machine(b);

        seed_segment(&gateway, "SEG_ROOT", "C_ROOT", false);
        seed_segment(&gateway, "SEG_R", "C_R", false);
        seed_segment(&gateway, "SEG_ROOT_2", "C_ROOT_2", false);
        seed_segment(&gateway, "SEG_N_2", "C_N_2", false);
        seed_segment(&gateway, "SEG_R_2", "C_R_2", true);

        let outcome = validate_paired_operation(&gateway, "PM1", "PM2", PointPosition::Reverse, "op1").await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "AFFECTED_SEGMENT_OCCUPIED");
    }
}
