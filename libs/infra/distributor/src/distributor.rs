//! Wires the notification subscription and the adaptive poller together and
//! forwards both onto one broadcast channel of `ChangeEvent`s.

use crate::config::DistributorConfig;
use crate::events::ChangeEvent;
use crate::fingerprint::{point_machine_fingerprint, signal_fingerprint, track_circuit_fingerprint, Fingerprint};
use crate::health::HealthClock;
use futures::StreamExt;
use signalbox_store::StoreGateway;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

const NOTIFICATION_CHANNEL: &str = "railway_changes";
const EVENT_BUS_CAPACITY: usize = 1024;

/// Read-only introspection snapshot, grounded on the original driver's
/// `getStatus()`-style poller diagnostic (see `SPEC_FULL.md` §C).
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub healthy: bool,
    pub last_notification_age: Duration,
    pub current_poll_interval: Duration,
    pub fast_cadence_forced: bool,
}

struct Fingerprints {
    signals: HashMap<String, Fingerprint>,
    track_circuits: HashMap<String, Fingerprint>,
    point_machines: HashMap<String, Fingerprint>,
}

pub struct Distributor<G: StoreGateway> {
    gateway: Arc<G>,
    config: DistributorConfig,
    health: Arc<HealthClock>,
    events: broadcast::Sender<ChangeEvent>,
    fingerprints: Mutex<Fingerprints>,
    current_interval_ms: AtomicU64,
    force_fast: AtomicBool,
}

impl<G: StoreGateway + Send + Sync + 'static> Distributor<G> {
    pub fn new(gateway: Arc<G>, config: DistributorConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Arc::new(Self {
            gateway,
            health: Arc::new(HealthClock::new(config.health_threshold)),
            config,
            events,
            fingerprints: Mutex::new(Fingerprints { signals: HashMap::new(), track_circuits: HashMap::new(), point_machines: HashMap::new() }),
            current_interval_ms: AtomicU64::new(config.poll_slow.as_millis() as u64),
            force_fast: AtomicBool::new(false),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ChangeEvent) {
        // A lagging/dropped subscriber is the receiver's problem, not a fault
        // in the distributor; there is always at least the channel itself.
        let _ = self.events.send(event);
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            healthy: self.health.is_healthy(),
            last_notification_age: self.health.age(),
            current_poll_interval: Duration::from_millis(self.current_interval_ms.load(Ordering::SeqCst)),
            fast_cadence_forced: self.force_fast.load(Ordering::SeqCst),
        }
    }

    fn set_poll_interval(&self, interval: Duration) {
        let ms = interval.as_millis() as u64;
        if self.current_interval_ms.swap(ms, Ordering::SeqCst) != ms {
            self.emit(ChangeEvent::PollingIntervalChanged { interval_ms: ms });
        }
    }

    /// Spawns the notification-consumer and polling tasks. Returns
    /// immediately; both tasks run until the gateway's notification stream
    /// ends or the process exits.
    pub fn spawn(self: &Arc<Self>) {
        let notify_self = Arc::clone(self);
        tokio::spawn(async move { notify_self.run_notification_loop().await });

        let health_self = Arc::clone(self);
        tokio::spawn(async move { health_self.run_health_timer().await });

        let poll_self = Arc::clone(self);
        tokio::spawn(async move { poll_self.run_poll_loop().await });
    }

    #[instrument(skip(self))]
    async fn run_notification_loop(self: Arc<Self>) {
        let mut stream = match self.gateway.subscribe(NOTIFICATION_CHANNEL).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%err, "failed to subscribe to notification channel; distributor falls back entirely to polling");
                return;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(notification) => {
                    let is_startup_probe = notification.test.as_deref() == Some("startup");
                    if self.health.record_notification() {
                        self.set_poll_interval(self.config.poll_slow);
                    }
                    if is_startup_probe {
                        debug!("startup self-test notification received, health updated, no refresh triggered");
                        continue;
                    }
                    self.dispatch_notification(&notification.table, &notification.entity_id);
                }
                Err(err) => warn!(%err, "malformed notification payload"),
            }
        }

        warn!("notification stream ended; distributor now relies solely on polling");
    }

    fn dispatch_notification(&self, table: &str, entity_id: &str) {
        match table {
            "signals" => {
                self.emit(ChangeEvent::SignalUpdated(entity_id.to_string()));
                self.emit(ChangeEvent::SignalsChanged);
            }
            "point_machines" => {
                self.emit(ChangeEvent::PointMachineUpdated(entity_id.to_string()));
                self.emit(ChangeEvent::PointMachinesChanged);
            }
            "track_circuits" => {
                self.emit(ChangeEvent::TrackCircuitUpdated(entity_id.to_string()));
                self.emit(ChangeEvent::TrackCircuitsChanged);
                self.emit(ChangeEvent::TrackSegmentsChanged);
            }
            other => debug!(table = other, "notification for a table the distributor does not forward"),
        }
    }

    #[instrument(skip(self))]
    async fn run_health_timer(self: Arc<Self>) {
        let mut timer = interval(self.config.health_check_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            timer.tick().await;
            if !self.health.reevaluate() {
                warn!(age_secs = self.health.age().as_secs(), "notification channel unhealthy, forcing FAST poll cadence");
                self.force_fast.store(true, Ordering::SeqCst);
                self.set_poll_interval(self.config.poll_fast);
            } else if self.force_fast.swap(false, Ordering::SeqCst) {
                self.set_poll_interval(self.config.poll_slow);
            }
        }
    }

    #[instrument(skip(self))]
    async fn run_poll_loop(self: Arc<Self>) {
        loop {
            let wait = Duration::from_millis(self.current_interval_ms.load(Ordering::SeqCst));
            tokio::time::sleep(wait).await;
            if let Err(err) = self.poll_once().await {
                warn!(%err, "poll sweep failed, will retry on next cadence");
            }
        }
    }

    async fn poll_once(&self) -> Result<(), signalbox_store::StoreError> {
        let signals = self.gateway.list_signals().await?;
        let circuits = self.gateway.list_track_circuits().await?;
        let machines = self.gateway.list_point_machines().await?;

        let mut fp = self.fingerprints.lock().unwrap();
        let mut any_signal_changed = false;
        for signal in &signals {
            let new_fp = signal_fingerprint(signal);
            if fp.signals.insert(signal.signal_id.clone(), new_fp) != Some(new_fp) {
                any_signal_changed = true;
                drop_and_emit(&self.events, ChangeEvent::SignalUpdated(signal.signal_id.clone()));
            }
        }
        if any_signal_changed {
            drop_and_emit(&self.events, ChangeEvent::SignalsChanged);
        }

        let mut any_circuit_changed = false;
        for circuit in &circuits {
            let new_fp = track_circuit_fingerprint(circuit);
            if fp.track_circuits.insert(circuit.circuit_id.clone(), new_fp) != Some(new_fp) {
                any_circuit_changed = true;
                drop_and_emit(&self.events, ChangeEvent::TrackCircuitUpdated(circuit.circuit_id.clone()));
                for segment in self.gateway.list_segments_by_circuit(&circuit.circuit_id).await? {
                    drop_and_emit(&self.events, ChangeEvent::TrackSegmentUpdated(segment.segment_id));
                }
            }
        }
        if any_circuit_changed {
            drop_and_emit(&self.events, ChangeEvent::TrackCircuitsChanged);
            drop_and_emit(&self.events, ChangeEvent::TrackSegmentsChanged);
        }

        let mut any_machine_changed = false;
        for machine in &machines {
            let new_fp = point_machine_fingerprint(machine);
            if fp.point_machines.insert(machine.machine_id.clone(), new_fp) != Some(new_fp) {
                any_machine_changed = true;
                drop_and_emit(&self.events, ChangeEvent::PointMachineUpdated(machine.machine_id.clone()));
            }
        }
        if any_machine_changed {
            drop_and_emit(&self.events, ChangeEvent::PointMachinesChanged);
        }

        info!(signals = signals.len(), circuits = circuits.len(), machines = machines.len(), "poll sweep complete");
        Ok(())
    }
}

fn drop_and_emit(events: &broadcast::Sender<ChangeEvent>, event: ChangeEvent) {
    let _ = events.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbox_model::{CallingOnAspect, LoopAspect, MainAspect, Signal, SignalType};
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

    #[tokio::test]
    async fn poll_once_emits_signal_updated_on_first_sweep() {
        let gateway = Arc::new(InMemoryStoreGateway::new());
        gateway.seed_signal(signal("SIG1", MainAspect::Red));
        let distributor = Distributor::new(gateway, DistributorConfig::default());
        let mut rx = distributor.subscribe_events();

        distributor.poll_once().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&ChangeEvent::SignalUpdated("SIG1".to_string())));
        assert!(seen.contains(&ChangeEvent::SignalsChanged));
    }

    #[tokio::test]
    async fn poll_once_is_silent_on_unchanged_state() {
        let gateway = Arc::new(InMemoryStoreGateway::new());
        gateway.seed_signal(signal("SIG1", MainAspect::Red));
        let distributor = Distributor::new(gateway, DistributorConfig::default());
        distributor.poll_once().await.unwrap();

        let mut rx = distributor.subscribe_events();
        distributor.poll_once().await.unwrap();
        assert!(rx.try_recv().is_err(), "no fingerprint changed, nothing should be emitted");
    }

    #[test]
    fn diagnostics_reports_initial_slow_cadence() {
        let gateway = Arc::new(InMemoryStoreGateway::new());
        let config = DistributorConfig::default();
        let distributor = Distributor::new(gateway, config);
        let diagnostics = distributor.diagnostics();
        assert_eq!(diagnostics.current_poll_interval, config.poll_slow);
        assert!(diagnostics.healthy);
    }
}
