//! Track-Circuit Branch (§4.6): reactive protection on occupancy transitions.
//!
//! Has no validation caller and no `Outcome` — every path here either
//! succeeds silently or emits a safety event the Change Distributor forwards
//! to observers (§7: "Reactive enforcement has no caller; failures are
//! emitted as safety signals").

use signalbox_model::{MainAspect, SignalId};
use signalbox_store::{StoreError, StoreGateway};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Outcome of reacting to one `unoccupied -> occupied` transition, consumed
/// by the Interlocking Service to raise the matching observer event.
#[derive(Debug, Clone, PartialEq)]
pub enum EnforcementOutcome {
    /// `occupied -> unoccupied`, or an already-occupied circuit renotified:
    /// this branch takes no action (§4.6: "do NOT clear or lower aspects").
    NoAction,
    AutomaticInterlockingCompleted { affected_signals: Vec<SignalId> },
    SystemFreezeRequired { reason: String, details: String },
    InterlockingFailure { failed_signals: Vec<SignalId>, error: String },
}

const SETTLING_DELAY: Duration = Duration::from_millis(50);

/// `react_to_track_occupancy_change`'s delegate for the dangerous transition.
#[instrument(skip(gateway))]
pub async fn on_occupancy_transition<G: StoreGateway>(
    gateway: &G,
    circuit_id: &str,
    was_occupied: bool,
    is_occupied: bool,
) -> Result<EnforcementOutcome, StoreError> {
    if was_occupied || !is_occupied {
        return Ok(EnforcementOutcome::NoAction);
    }

    let s1 = gateway.protecting_signals_from_interlocking_rules(circuit_id).await?;
    let s2 = gateway.protecting_signals_from_track_circuits(circuit_id).await?;
    let s3 = gateway.protecting_signals_from_track_segments(circuit_id).await?;

    let sources = [("interlocking_rules", &s1), ("track_circuits", &s2), ("track_segments", &s3)];
    let non_empty: Vec<_> = sources.iter().filter(|(_, signals)| !signals.is_empty()).collect();

    for window in non_empty.windows(2) {
        let (name_a, a) = window[0];
        let (name_b, b) = window[1];
        let mut sorted_a = (*a).clone();
        sorted_a.sort();
        let mut sorted_b = (*b).clone();
        sorted_b.sort();
        if sorted_a != sorted_b {
            let details = format!("{name_a}={a:?} disagrees with {name_b}={b:?}");
            error!(circuit_id, %details, "triple-source protecting-signal mismatch");
            return Ok(EnforcementOutcome::SystemFreezeRequired {
                reason: "TRACK_CIRCUIT_PROTECTION_SOURCES_DISAGREE".to_string(),
                details,
            });
        }
    }

    // Authoritative priority: interlocking-rules > track-circuits > track-segments.
    let authoritative = if !s1.is_empty() {
        s1
    } else if !s2.is_empty() {
        s2
    } else {
        s3
    };

    if authoritative.is_empty() {
        // No protecting signals configured for this circuit: non-fatal, just
        // nothing to enforce (mirrors the original hardware driver's
        // all-sources-empty path, which warns rather than freezes).
        warn!(circuit_id, "occupancy transition with no configured protecting signals");
        return Ok(EnforcementOutcome::AutomaticInterlockingCompleted { affected_signals: vec![] });
    }

    let mut forced = Vec::new();
    for signal_id in &authoritative {
        let signal = gateway.get_signal(signal_id).await?;
        if signal.main_aspect != MainAspect::Red {
            gateway.update_signal_aspect(signal_id, MainAspect::Red, "system:track_circuit_branch").await?;
            forced.push(signal_id.clone());
        }
    }

    if !forced.is_empty() {
        tokio::time::sleep(SETTLING_DELAY).await;
    }

    let mut failed = Vec::new();
    for signal_id in &forced {
        let signal = gateway.get_signal(signal_id).await?;
        if signal.main_aspect != MainAspect::Red {
            failed.push(signal_id.clone());
        }
    }

    if !failed.is_empty() {
        error!(circuit_id, ?failed, "signals failed to settle at RED after enforcement");
        return Ok(EnforcementOutcome::InterlockingFailure { failed_signals: failed, error: "signal did not confirm RED after settling delay".to_string() });
    }

    info!(circuit_id, affected = authoritative.len(), "automatic interlocking completed");
    Ok(EnforcementOutcome::AutomaticInterlockingCompleted { affected_signals: authoritative })
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbox_model::{CallingOnAspect, LoopAspect, Signal, SignalType, TrackCircuit, TrackSegment};
    use signalbox_store::InMemoryStoreGateway;
    use std::collections::HashSet;

    fn signal(id: &str, aspect: MainAspect) -> Signal {
        Signal {
            signal_id: id.to_string(),
            signal_type: SignalType::Home,
            main_aspect: aspect,
            calling_on_aspect: CallingOnAspect::Off,
            loop_aspect: LoopAspect::Off,
            is_locked: false,
            is_active: true,
            possible_aspects: HashSet::from([MainAspect::Red, MainAspect::Green]),
            protected_track_circuits: vec!["C1".to_string()],
            interlocked_with: vec![],
        }
    }

    #[tokio::test]
    async fn occupied_to_unoccupied_takes_no_action() {
        let gateway = InMemoryStoreGateway::new();
        let outcome = on_occupancy_transition(&gateway, "C1", true, false).await.unwrap();
        assert_eq!(outcome, EnforcementOutcome::NoAction);
    }

    #[tokio::test]
    async fn forces_non_red_protecting_signal_to_red() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(signal("SIG1", MainAspect::Green));
        gateway.seed_rule_protected_circuits("SIG1", vec!["C1".to_string()]);
        gateway.seed_track_circuit(TrackCircuit {
            circuit_id: "C1".to_string(),
            is_occupied: true,
            occupied_by: None,
            is_assigned: false,
            is_overlap: false,
            protecting_signals: vec!["SIG1".to_string()],
        });
        gateway.seed_track_segment(TrackSegment {
            segment_id: "SEG1".to_string(),
            circuit_id: "C1".to_string(),
            is_assigned: false,
            is_overlap: false,
            protecting_signals: vec!["SIG1".to_string()],
        });

        let outcome = on_occupancy_transition(&gateway, "C1", false, true).await.unwrap();
        assert_eq!(outcome, EnforcementOutcome::AutomaticInterlockingCompleted { affected_signals: vec!["SIG1".to_string()] });
        assert_eq!(gateway.get_signal("SIG1").await.unwrap().main_aspect, MainAspect::Red);
    }

    #[tokio::test]
    async fn disagreeing_sources_freeze_instead_of_enforcing() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(signal("SIG1", MainAspect::Green));
        gateway.seed_rule_protected_circuits("SIG1", vec!["C1".to_string()]);
        gateway.seed_track_circuit(TrackCircuit {
            circuit_id: "C1".to_string(),
            is_occupied: true,
            occupied_by: None,
            is_assigned: false,
            is_overlap: false,
            protecting_signals: vec!["SIG2".to_string()],
        });

        let outcome = on_occupancy_transition(&gateway, "C1", false, true).await.unwrap();
        assert!(matches!(outcome, EnforcementOutcome::SystemFreezeRequired { .. }));
        assert_eq!(gateway.get_signal("SIG1").await.unwrap().main_aspect, MainAspect::Green, "no enforcement attempted once sources disagree");
    }
}
