//! Per-entity state fingerprints the poller diffs against on every sweep.
//! Polling is the safety net (§4.2): it does not trust the notification
//! channel to have told it everything, so it recomputes these independently.

use signalbox_model::{PointMachine, Signal, TrackCircuit};

pub type Fingerprint = u64;

fn hash(value: impl std::hash::Hash) -> Fingerprint {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

pub fn signal_fingerprint(signal: &Signal) -> Fingerprint {
    hash((signal.main_aspect, signal.calling_on_aspect, signal.loop_aspect, signal.is_locked, signal.is_active))
}

pub fn track_circuit_fingerprint(circuit: &TrackCircuit) -> Fingerprint {
    hash((circuit.is_occupied, circuit.occupied_by.clone(), circuit.is_assigned))
}

pub fn point_machine_fingerprint(machine: &PointMachine) -> Fingerprint {
    hash((machine.current_position, machine.operating_status, machine.is_locked))
}
