//! The subset of the §6 observer surface the distributor itself raises.
//! The remaining event classes (`route_*`, `resource_lock_*`,
//! `operation_blocked`, ...) are raised by `signalbox-routes` and
//! `signalbox-service`, which sit closer to the actions that cause them.

use signalbox_model::{CircuitId, MachineId, SegmentId, SignalId};

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    SignalsChanged,
    PointMachinesChanged,
    TrackCircuitsChanged,
    TrackSegmentsChanged,
    SignalUpdated(SignalId),
    PointMachineUpdated(MachineId),
    TrackCircuitUpdated(CircuitId),
    TrackSegmentUpdated(SegmentId),
    PollingIntervalChanged { interval_ms: u64 },
}
