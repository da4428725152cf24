//! Signal Branch (§4.4): main-aspect and subsidiary-aspect change validation.

use crate::errors::ValidationError;
use signalbox_model::{BlockReason, CallingOnAspect, CompositeAspect, LoopAspect, MainAspect, Outcome, Signal};
use signalbox_rules::{RuleContext, RuleEngine};
use signalbox_store::StoreGateway;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsidiaryKind {
    CallingOn,
    Loop,
}

fn blocked(err: ValidationError) -> Outcome<()> {
    Outcome::Blocked(BlockReason::new(err.rule_id(), err.to_string()))
}

/// `validate_main_aspect_change(signal, current, requested)` of §4.4.
///
/// Reads the signal fresh from the gateway; the caller is responsible for
/// re-validating before the subsequent write lands, per §4.4's ordering note.
#[instrument(skip(gateway, rules, ctx))]
pub async fn validate_main_aspect_change<G: StoreGateway>(
    gateway: &G,
    rules: &RuleEngine,
    ctx: &RuleContext,
    signal_id: &str,
    requested: MainAspect,
) -> Result<Outcome<()>, signalbox_store::StoreError> {
    let signal = match gateway.get_signal(signal_id).await {
        Ok(signal) => signal,
        Err(signalbox_store::StoreError::NotFound { .. }) => return Ok(blocked(ValidationError::SignalNotFound(signal_id.to_string()))),
        Err(other) => return Err(other),
    };

    if !signal.is_commandable() {
        return Ok(blocked(ValidationError::SignalInactive(signal_id.to_string())));
    }

    let current = signal.main_aspect;

    if requested == current {
        if requested == MainAspect::Red {
            warn!(signal_id, "RED re-affirmation: identical-aspect transition accepted as safety redundancy");
            return Ok(Outcome::Allowed(()));
        }
        return Ok(blocked(ValidationError::InvalidTransition));
    }

    // Main-group <-> calling-on-group intermixing cannot happen here: this
    // branch only ever touches `main_aspect`, never the subsidiary fields.
    if requested != MainAspect::Red && !signal.possible_aspects.contains(&requested) {
        return Ok(blocked(ValidationError::AspectNotSupported));
    }

    if requested != MainAspect::Red {
        if let Some(outcome) = check_protected_circuits(gateway, &signal).await? {
            return Ok(outcome);
        }
    }

    let requested_composite = CompositeAspect::new(requested, signal.calling_on_aspect, signal.loop_aspect);
    let current_composite = signal.composite_aspect();
    Ok(rules.validate_aspect_change(signal_id, current_composite, requested_composite, ctx))
}

/// Point 3 of §4.4: the signal's own `protected_track_circuits` and the
/// interlocking-rules table's view of the same must agree, and whichever set
/// is authoritative must be entirely clear.
async fn check_protected_circuits<G: StoreGateway>(gateway: &G, signal: &Signal) -> Result<Option<Outcome<()>>, signalbox_store::StoreError> {
    let mut own: Vec<_> = signal.protected_track_circuits.clone();
    own.sort();
    let mut from_rules = gateway.protected_circuits_from_interlocking_rules(&signal.signal_id).await?;
    from_rules.sort();

    if !own.is_empty() && !from_rules.is_empty() && own != from_rules {
        return Ok(Some(Outcome::Blocked(
            BlockReason::new(
                ValidationError::TrackCircuitProtectionInconsistent.rule_id(),
                format!("signal {} lists {:?} but interlocking_rules lists {:?}", signal.signal_id, own, from_rules),
            )
            .with_entities([signal.signal_id.clone()])
            .safety_critical(),
        )));
    }

    let effective = if !own.is_empty() { own } else { from_rules };

    let mut occupied_by = Vec::new();
    for circuit_id in &effective {
        let circuit = gateway.get_track_circuit(circuit_id).await?;
        if circuit.is_occupied {
            occupied_by.push(circuit_id.clone());
        }
    }

    if !occupied_by.is_empty() {
        return Ok(Some(Outcome::Blocked(
            BlockReason::new(ValidationError::ProtectedCircuitOccupied.rule_id(), format!("protected circuits occupied: {occupied_by:?}"))
                .with_entities(occupied_by),
        )));
    }

    Ok(None)
}

/// `validate_subsidiary_aspect_change(signal, type, current, requested)` of §4.4.
#[instrument(skip(gateway, rules, ctx))]
pub async fn validate_subsidiary_aspect_change<G: StoreGateway>(
    gateway: &G,
    rules: &RuleEngine,
    ctx: &RuleContext,
    signal_id: &str,
    kind: SubsidiaryKind,
    turned_on: bool,
) -> Result<Outcome<()>, signalbox_store::StoreError> {
    let signal = match gateway.get_signal(signal_id).await {
        Ok(signal) => signal,
        Err(signalbox_store::StoreError::NotFound { .. }) => return Ok(blocked(ValidationError::SignalNotFound(signal_id.to_string()))),
        Err(other) => return Err(other),
    };

    if !signal.is_commandable() {
        return Ok(blocked(ValidationError::SignalInactive(signal_id.to_string())));
    }

    // Turning off is unconditionally allowed.
    if !turned_on {
        return Ok(Outcome::Allowed(()));
    }

    if kind == SubsidiaryKind::CallingOn && signal.main_aspect != MainAspect::Red {
        return Ok(blocked(ValidationError::InvalidTransition));
    }

    let predicted = match kind {
        SubsidiaryKind::CallingOn => CompositeAspect::new(signal.main_aspect, CallingOnAspect::White, signal.loop_aspect),
        SubsidiaryKind::Loop => CompositeAspect::new(signal.main_aspect, signal.calling_on_aspect, LoopAspect::Yellow),
    };

    Ok(rules.validate_aspect_change(signal_id, signal.composite_aspect(), predicted, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbox_model::SignalType;
    use signalbox_rules::RuleDocument;
    use signalbox_store::InMemoryStoreGateway;
    use std::collections::HashSet;

    fn sample_signal(id: &str) -> Signal {
        Signal {
            signal_id: id.to_string(),
            signal_type: SignalType::Home,
            main_aspect: MainAspect::Red,
            calling_on_aspect: CallingOnAspect::Off,
            loop_aspect: LoopAspect::Off,
            is_locked: false,
            is_active: true,
            possible_aspects: [MainAspect::Red, MainAspect::Green].into_iter().collect::<HashSet<_>>(),
            protected_track_circuits: vec![],
            interlocked_with: vec![],
        }
    }

    fn independent_engine() -> RuleEngine {
        let mut doc = RuleDocument::new();
        doc.insert(
            "HOME_1".to_string(),
            signalbox_model::SignalRuleConfig { independent: true, control_mode: signalbox_model::ControlMode::And, controlled_by: vec![], rules: vec![] },
        );
        RuleEngine::new(doc)
    }

    #[tokio::test]
    async fn unknown_signal_blocks_with_not_found() {
        let gateway = InMemoryStoreGateway::new();
        let rules = independent_engine();
        let ctx = RuleContext::new();
        let outcome = validate_main_aspect_change(&gateway, &rules, &ctx, "HOME_1", MainAspect::Green).await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "SIGNAL_NOT_FOUND");
    }

    #[tokio::test]
    async fn red_to_red_is_allowed_as_reaffirmation() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(sample_signal("HOME_1"));
        let rules = independent_engine();
        let ctx = RuleContext::new();
        let outcome = validate_main_aspect_change(&gateway, &rules, &ctx, "HOME_1", MainAspect::Red).await.unwrap();
        assert!(outcome.is_allowed());
    }

    #[tokio::test]
    async fn non_red_same_aspect_is_blocked() {
        let gateway = InMemoryStoreGateway::new();
        let mut signal = sample_signal("HOME_1");
        signal.main_aspect = MainAspect::Green;
        gateway.seed_signal(signal);
        let rules = independent_engine();
        let ctx = RuleContext::new();
        let outcome = validate_main_aspect_change(&gateway, &rules, &ctx, "HOME_1", MainAspect::Green).await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn aspect_outside_possible_aspects_is_blocked() {
        let gateway = InMemoryStoreGateway::new();
        gateway.seed_signal(sample_signal("HOME_1"));
        let rules = independent_engine();
        let ctx = RuleContext::new();
        let outcome = validate_main_aspect_change(&gateway, &rules, &ctx, "HOME_1", MainAspect::Yellow).await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "ASPECT_NOT_SUPPORTED");
    }

    #[tokio::test]
    async fn occupied_protected_circuit_blocks() {
        let gateway = InMemoryStoreGateway::new();
        let mut signal = sample_signal("HOME_1");
        signal.protected_track_circuits = vec!["C1".to_string()];
        gateway.seed_signal(signal);
        gateway.seed_rule_protected_circuits("HOME_1", vec!["C1".to_string()]);
        gateway.seed_track_circuit(signalbox_model::TrackCircuit {
            circuit_id: "C1".to_string(),
            is_occupied: true,
            occupied_by: Some("TRAIN_1".to_string()),
            is_assigned: false,
            is_overlap: false,
            protecting_signals: vec!["HOME_1".to_string()],
        });
        let rules = independent_engine();
        let ctx = RuleContext::new();
        let outcome = validate_main_aspect_change(&gateway, &rules, &ctx, "HOME_1", MainAspect::Green).await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "PROTECTED_CIRCUIT_OCCUPIED");
    }

    #[tokio::test]
    async fn disagreeing_protection_sources_block_as_safety_critical() {
        let gateway = InMemoryStoreGateway::new();
        let mut signal = sample_signal("HOME_1");
        signal.protected_track_circuits = vec!["C1".to_string()];
        gateway.seed_signal(signal);
        gateway.seed_rule_protected_circuits("HOME_1", vec!["C2".to_string()]);
        let rules = independent_engine();
        let ctx = RuleContext::new();
        let outcome = validate_main_aspect_change(&gateway, &rules, &ctx, "HOME_1", MainAspect::Green).await.unwrap();
        let reason = outcome.reason().unwrap();
        assert_eq!(reason.rule_id, "TRACK_CIRCUIT_PROTECTION_INCONSISTENT");
        assert!(reason.safety_critical);
    }

    #[tokio::test]
    async fn turning_calling_on_while_main_is_not_red_blocks() {
        let gateway = InMemoryStoreGateway::new();
        let mut signal = sample_signal("HOME_1");
        signal.main_aspect = MainAspect::Green;
        gateway.seed_signal(signal);
        let rules = independent_engine();
        let ctx = RuleContext::new();
        let outcome = validate_subsidiary_aspect_change(&gateway, &rules, &ctx, "HOME_1", SubsidiaryKind::CallingOn, true).await.unwrap();
        assert_eq!(outcome.reason().unwrap().rule_id, "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn turning_a_subsidiary_off_is_always_allowed() {
        let gateway = InMemoryStoreGateway::new();
        let mut signal = sample_signal("HOME_1");
        signal.main_aspect = MainAspect::Green;
        signal.loop_aspect = LoopAspect::Yellow;
        gateway.seed_signal(signal);
        let rules = independent_engine();
        let ctx = RuleContext::new();
        let outcome = validate_subsidiary_aspect_change(&gateway, &rules, &ctx, "HOME_1", SubsidiaryKind::Loop, false).await.unwrap();
        assert!(outcome.is_allowed());
    }
}
