//! Track segment and track circuit entities.

use crate::ids::{CircuitId, SegmentId, SignalId};
use serde::{Deserialize, Serialize};

/// A UI-layout granularity track element. Has no occupancy of its own; it
/// derives occupancy from its owning circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub segment_id: SegmentId,
    pub circuit_id: CircuitId,
    pub is_assigned: bool,
    pub is_overlap: bool,
    pub protecting_signals: Vec<SignalId>,
}

/// Hardware-authoritative occupancy sensor spanning one or more segments.
///
/// Occupancy transitions are hardware-authoritative: software never
/// unilaterally "clears" an occupied circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCircuit {
    pub circuit_id: CircuitId,
    pub is_occupied: bool,
    pub occupied_by: Option<String>,
    pub is_assigned: bool,
    pub is_overlap: bool,
    pub protecting_signals: Vec<SignalId>,
}

impl TrackCircuit {
    pub fn is_clear(&self) -> bool {
        !self.is_occupied
    }
}
