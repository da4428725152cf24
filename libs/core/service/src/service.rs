//! The Interlocking Service facade (§4.8): the single entry point the HMI
//! and the distributor's reactive hook go through.

use crate::config::ServiceConfig;
use crate::context::build_rule_context;
use crate::errors::ServiceError;
use crate::latch::OperationalLatch;
use crate::metrics::ResponseTimeWindow;
use signalbox_model::{MainAspect, Outcome, PointPosition};
use signalbox_rules::RuleEngine;
use signalbox_store::StoreGateway;
use signalbox_validation::{track_circuit_branch::EnforcementOutcome, SubsidiaryKind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{error, instrument, warn};

use crate::events::ServiceEvent;

const EVENT_BUS_CAPACITY: usize = 1024;

pub struct InterlockingService<G: StoreGateway> {
    gateway: Arc<G>,
    rules: Arc<RuleEngine>,
    config: ServiceConfig,
    latch: OperationalLatch,
    latency: ResponseTimeWindow,
    events: broadcast::Sender<ServiceEvent>,
}

impl<G: StoreGateway> InterlockingService<G> {
    /// `is_operational` requires a connected store and loaded rules (§4.8);
    /// the caller only gets this far once both are true, so construction
    /// itself reinitializes the latch.
    pub fn new(gateway: Arc<G>, rules: Arc<RuleEngine>, config: ServiceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let latch = OperationalLatch::default();
        latch.reinitialize();
        Self { gateway, rules, config, latch, latency: ResponseTimeWindow::default(), events }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    /// Exposes the underlying gateway for app-level wiring (e.g. bridging
    /// the distributor's change events into `react_to_track_occupancy_change`)
    /// that doesn't belong in either library.
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn is_operational(&self) -> bool {
        self.latch.is_operational()
    }

    pub fn average_response_time_ms(&self) -> Option<f64> {
        self.latency.average()
    }

    /// Manual reinitialization after a freeze (§9): the only path back to
    /// operational.
    pub fn reinitialize(&self) {
        self.latch.reinitialize();
        let _ = self.events.send(ServiceEvent::OperationalStateChanged(true));
    }

    fn emit(&self, event: ServiceEvent) {
        let _ = self.events.send(event);
    }

    fn freeze(&self, segment_id: impl Into<String>, reason: impl Into<String>, detail: impl Into<String>) {
        if self.latch.trip() {
            self.emit(ServiceEvent::OperationalStateChanged(false));
        }
        self.emit(ServiceEvent::SystemFreezeRequired { segment_id: segment_id.into(), reason: reason.into(), detail: detail.into() });
    }

    /// Times a validation call, warns on a slow operation, and blocks
    /// entirely once the hard ceiling is exceeded (§5).
    async fn timed<T, F, Fut>(&self, entity_id: &str, op: F) -> Result<Outcome<T>, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Outcome<T>, signalbox_store::StoreError>>,
    {
        if !self.is_operational() {
            return Err(ServiceError::NotOperational);
        }

        let started = Instant::now();
        let outcome = op().await?;
        let elapsed = started.elapsed();
        self.latency.record(elapsed.as_secs_f64() * 1000.0);

        if elapsed > self.config.hard_ceiling {
            error!(entity_id, elapsed_ms = elapsed.as_millis() as u64, "validation exceeded hard ceiling");
            return Ok(Outcome::blocked("TIMEOUT_EXCEEDED", format!("exceeded {}ms hard ceiling", self.config.hard_ceiling.as_millis())));
        }
        if elapsed > self.config.target_response {
            warn!(entity_id, elapsed_ms = elapsed.as_millis() as u64, "slow operation");
        }

        if let Outcome::Blocked(reason) = &outcome {
            self.emit(ServiceEvent::OperationBlocked { entity_id: entity_id.to_string(), reason: reason.message.clone(), rule_id: reason.rule_id });
        }

        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn change_main_aspect(&self, signal_id: &str, requested: MainAspect, operator_id: &str) -> Result<Outcome<()>, ServiceError> {
        let gateway = Arc::clone(&self.gateway);
        let rules = Arc::clone(&self.rules);
        let ctx = build_rule_context(gateway.as_ref()).await?;
        let outcome = self
            .timed(signal_id, || async move { signalbox_validation::validate_main_aspect_change(gateway.as_ref(), &rules, &ctx, signal_id, requested).await })
            .await?;

        if let Outcome::Allowed(()) = &outcome {
            self.gateway.update_signal_aspect(signal_id, requested, operator_id).await?;
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn change_subsidiary_aspect(&self, signal_id: &str, kind: SubsidiaryKind, turned_on: bool, operator_id: &str) -> Result<Outcome<()>, ServiceError> {
        let gateway = Arc::clone(&self.gateway);
        let rules = Arc::clone(&self.rules);
        let ctx = build_rule_context(gateway.as_ref()).await?;
        let outcome = self
            .timed(signal_id, || async move {
                signalbox_validation::validate_subsidiary_aspect_change(gateway.as_ref(), &rules, &ctx, signal_id, kind, turned_on).await
            })
            .await?;

        if let Outcome::Allowed(()) = &outcome {
            self.gateway.update_subsidiary_signal_aspect(signal_id, kind.into(), turned_on, operator_id).await?;
        }
        Ok(outcome)
    }

    /// Branches on `paired_entity` before choosing the single or paired
    /// validator (§4.5), matching the original's `getPairedMachine` check
    /// before `validatePairedPointMachineOperation`.
    #[instrument(skip(self))]
    pub async fn change_point_position(&self, machine_id: &str, requested: PointPosition, operator_id: &str) -> Result<Outcome<()>, ServiceError> {
        // A missing machine is left to `validate_position_change` inside
        // `timed` below, which turns it into a blocked outcome rather than
        // an error; here we only need to know whether it's paired.
        let paired_id = match self.gateway.get_point_machine(machine_id).await {
            Ok(machine) => machine.paired_entity,
            Err(signalbox_store::StoreError::NotFound { .. }) => None,
            Err(other) => return Err(other.into()),
        };

        let gateway = Arc::clone(&self.gateway);
        let operator = operator_id.to_string();
        let machine_id_owned = machine_id.to_string();
        let outcome = self
            .timed(machine_id, || async move {
                match &paired_id {
                    Some(paired_id) => signalbox_validation::validate_paired_operation(gateway.as_ref(), &machine_id_owned, paired_id, requested, &operator).await,
                    None => signalbox_validation::validate_position_change(gateway.as_ref(), &machine_id_owned, requested, &operator).await,
                }
            })
            .await?;

        if let Outcome::Allowed(()) = &outcome {
            let result = self.gateway.update_point_position_paired(&machine_id.to_string(), requested, operator_id).await?;
            if result.position_mismatch_corrected {
                if let Ok(machine) = self.gateway.get_point_machine(machine_id).await {
                    if let Some(paired_id) = machine.paired_entity {
                        self.emit(ServiceEvent::PositionMismatchCorrected { machine_id: machine_id.to_string(), paired_id: paired_id.clone() });
                        self.emit(ServiceEvent::PairedMachinesUpdated { machine_ids: vec![machine_id.to_string(), paired_id] });
                    }
                }
            }
        }
        Ok(outcome)
    }

    /// `react_to_track_occupancy_change(segment_id, was_occupied, is_occupied)`
    /// of §4.8: the facade's only reactive (non-operator-initiated) entry
    /// point, delegating straight to the Track-Circuit Branch.
    #[instrument(skip(self))]
    pub async fn react_to_track_occupancy_change(&self, segment_id: &str, was_occupied: bool, is_occupied: bool) -> Result<(), ServiceError> {
        let segment = self.gateway.get_track_segment(segment_id).await?;
        let outcome = signalbox_validation::on_occupancy_transition(self.gateway.as_ref(), &segment.circuit_id, was_occupied, is_occupied).await?;

        match outcome {
            EnforcementOutcome::NoAction => {}
            EnforcementOutcome::AutomaticInterlockingCompleted { affected_signals } if !affected_signals.is_empty() => {
                self.emit(ServiceEvent::AutomaticProtectionActivated {
                    entity_id: segment.circuit_id.clone(),
                    reason: format!("forced RED on {affected_signals:?}"),
                });
            }
            EnforcementOutcome::AutomaticInterlockingCompleted { .. } => {}
            EnforcementOutcome::SystemFreezeRequired { reason, details } => {
                self.freeze(segment_id, reason, details);
            }
            EnforcementOutcome::InterlockingFailure { failed_signals, error } => {
                self.emit(ServiceEvent::CriticalSafetyViolation { entity_id: format!("{failed_signals:?}"), detail: error.clone() });
                self.freeze(segment_id, "ENFORCEMENT_FAILED", error);
            }
        }
        Ok(())
    }
}

impl From<SubsidiaryKind> for signalbox_store::SubsidiaryKind {
    fn from(kind: SubsidiaryKind) -> Self {
        match kind {
            SubsidiaryKind::CallingOn => Self::CallingOn,
            SubsidiaryKind::Loop => Self::Loop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbox_model::{CallingOnAspect, LoopAspect, Signal, SignalType, TrackCircuit, TrackSegment};
    use signalbox_rules::RuleDocument;
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
            protected_track_circuits: vec![],
            interlocked_with: vec![],
        }
    }

    fn independent_engine(signal_id: &str) -> Arc<RuleEngine> {
        let mut doc = RuleDocument::new();
        doc.insert(
            signal_id.to_string(),
            signalbox_model::SignalRuleConfig { independent: true, control_mode: signalbox_model::ControlMode::And, controlled_by: vec![], rules: vec![] },
        );
        Arc::new(RuleEngine::new(doc))
    }

    #[tokio::test]
    async fn allowed_change_updates_store_and_records_latency() {
        let gateway = Arc::new(InMemoryStoreGateway::new());
        gateway.seed_signal(signal("SIG1", MainAspect::Red));
        let service = InterlockingService::new(Arc::clone(&gateway), independent_engine("SIG1"), ServiceConfig::default());

        let outcome = service.change_main_aspect("SIG1", MainAspect::Green, "op1").await.unwrap();
        assert!(outcome.is_allowed());
        assert_eq!(gateway.get_signal("SIG1").await.unwrap().main_aspect, MainAspect::Green);
        assert!(service.average_response_time_ms().is_some());
    }

    #[tokio::test]
    async fn blocked_change_does_not_mutate_store_and_emits_operation_blocked() {
        let gateway = Arc::new(InMemoryStoreGateway::new());
        gateway.seed_signal(signal("SIG1", MainAspect::Red));
        let service = InterlockingService::new(Arc::clone(&gateway), independent_engine("SIG1"), ServiceConfig::default());
        let mut rx = service.subscribe_events();

        let outcome = service.change_main_aspect("SIG1", MainAspect::Yellow, "op1").await.unwrap();
        assert!(!outcome.is_allowed());
        assert_eq!(gateway.get_signal("SIG1").await.unwrap().main_aspect, MainAspect::Red);
        assert!(matches!(rx.try_recv().unwrap(), ServiceEvent::OperationBlocked { .. }));
    }

    #[tokio::test]
    async fn disagreeing_protection_sources_freeze_the_system() {
        let gateway = Arc::new(InMemoryStoreGateway::new());
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
        gateway.seed_track_segment(TrackSegment {
            segment_id: "SEG1".to_string(),
            circuit_id: "C1".to_string(),
            is_assigned: false,
            is_overlap: false,
            protecting_signals: vec![],
        });
        let service = InterlockingService::new(Arc::clone(&gateway), independent_engine("SIG1"), ServiceConfig::default());
        assert!(service.is_operational());

        service.react_to_track_occupancy_change("SEG1", false, true).await.unwrap();
        assert!(!service.is_operational());

        service.reinitialize();
        assert!(service.is_operational());
    }

    fn point_machine(id: &str, position: PointPosition, paired_entity: Option<&str>, root: &str, normal: &str, reverse: &str, host: &str) -> signalbox_model::PointMachine {
        signalbox_model::PointMachine {
            machine_id: id.to_string(),
            current_position: position,
            operating_status: signalbox_model::OperatingStatus::Available,
            paired_entity: paired_entity.map(str::to_string),
            host_track_circuit: host.to_string(),
            is_locked: false,
            time_lock_expires_at: None,
            protected_signals: vec![],
            detection_locking_circuits: vec![],
            conflicting_machines: vec![],
            root_segment: root.to_string(),
            normal_segment: normal.to_string(),
            reverse_segment: reverse.to_string(),
        }
    }

    fn clear_segment(segment_id: &str, circuit_id: &str) -> TrackSegment {
        TrackSegment { segment_id: segment_id.to_string(), circuit_id: circuit_id.to_string(), is_assigned: false, is_overlap: false, protecting_signals: vec![] }
    }

    fn clear_circuit(circuit_id: &str) -> TrackCircuit {
        TrackCircuit { circuit_id: circuit_id.to_string(), is_occupied: false, occupied_by: None, is_assigned: false, is_overlap: false, protecting_signals: vec![] }
    }

    /// §4.5 / scenario S3: a paired move routes through `validate_paired_operation`,
    /// so an occupied segment on the *paired* machine's requested side blocks it
    /// even though the primary machine itself is entirely clear.
    #[tokio::test]
    async fn paired_move_is_blocked_by_the_paired_machines_occupied_segment() {
        let gateway = Arc::new(InMemoryStoreGateway::new());
        gateway.seed_point_machine(point_machine("PM1", PointPosition::Normal, Some("PM2"), "SEG_ROOT_1", "SEG_N_1", "SEG_R_1", "C1"));
        gateway.seed_point_machine(point_machine("PM2", PointPosition::Normal, Some("PM1"), "SEG_ROOT_2", "SEG_N_2", "SEG_R_2", "C2"));
        gateway.seed_track_circuit(clear_circuit("C1"));
        gateway.seed_track_circuit(clear_circuit("C2"));
        gateway.seed_track_segment(clear_segment("SEG_ROOT_1", "C1"));
        gateway.seed_track_segment(clear_segment("SEG_N_1", "C1"));
        gateway.seed_track_segment(clear_segment("SEG_R_1", "C1"));
        gateway.seed_track_segment(clear_segment("SEG_ROOT_2", "C2"));
        gateway.seed_track_segment(clear_segment("SEG_N_2", "C2"));
        let mut occupied_reverse = clear_segment("SEG_R_2", "C2");
        occupied_reverse.circuit_id = "C2_OCCUPIED".to_string();
        gateway.seed_track_segment(occupied_reverse);
        let mut occupied_circuit = clear_circuit("C2_OCCUPIED");
        occupied_circuit.is_occupied = true;
        gateway.seed_track_circuit(occupied_circuit);

        let service = InterlockingService::new(Arc::clone(&gateway), independent_engine("SIG1"), ServiceConfig::default());

        let outcome = service.change_point_position("PM1", PointPosition::Reverse, "op1").await.unwrap();
        assert!(!outcome.is_allowed());
        assert_eq!(gateway.get_point_machine("PM1").await.unwrap().current_position, PointPosition::Normal);
    }

    /// Scenario S3 (§8): the store corrects a settled-position mismatch
    /// between a paired pair; the service must surface that correction.
    #[tokio::test]
    async fn paired_move_reports_position_mismatch_correction() {
        let gateway = Arc::new(InMemoryStoreGateway::new());
        gateway.seed_point_machine(point_machine("PM1", PointPosition::Normal, Some("PM2"), "SEG_ROOT_1", "SEG_N_1", "SEG_R_1", "C1"));
        gateway.seed_point_machine(point_machine("PM2", PointPosition::Reverse, Some("PM1"), "SEG_ROOT_2", "SEG_N_2", "SEG_R_2", "C2"));
        gateway.seed_track_circuit(clear_circuit("C1"));
        gateway.seed_track_circuit(clear_circuit("C2"));
        gateway.seed_track_segment(clear_segment("SEG_ROOT_1", "C1"));
        gateway.seed_track_segment(clear_segment("SEG_N_1", "C1"));
        gateway.seed_track_segment(clear_segment("SEG_R_1", "C1"));
        gateway.seed_track_segment(clear_segment("SEG_ROOT_2", "C2"));
        gateway.seed_track_segment(clear_segment("SEG_N_2", "C2"));
        gateway.seed_track_segment(clear_segment("SEG_R_2", "C2"));

        let service = InterlockingService::new(Arc::clone(&gateway), independent_engine("SIG1"), ServiceConfig::default());
        let mut rx = service.subscribe_events();

        let outcome = service.change_point_position("PM1", PointPosition::Normal, "op1").await.unwrap();
        assert!(outcome.is_allowed());
        assert_eq!(gateway.get_point_machine("PM1").await.unwrap().current_position, PointPosition::Normal);
        assert_eq!(gateway.get_point_machine("PM2").await.unwrap().current_position, PointPosition::Normal);

        let mut saw_mismatch = false;
        let mut saw_paired_update = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ServiceEvent::PositionMismatchCorrected { machine_id, paired_id } => {
                    assert_eq!(machine_id, "PM1");
                    assert_eq!(paired_id, "PM2");
                    saw_mismatch = true;
                }
                ServiceEvent::PairedMachinesUpdated { machine_ids } => {
                    assert_eq!(machine_ids, vec!["PM1".to_string(), "PM2".to_string()]);
                    saw_paired_update = true;
                }
                _ => {}
            }
        }
        assert!(saw_mismatch, "expected a PositionMismatchCorrected event");
        assert!(saw_paired_update, "expected a PairedMachinesUpdated event");
    }
}
