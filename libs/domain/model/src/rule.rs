//! Declarative interlocking rule types.
//!
//! These are the in-memory shape of the rule document (§4.3); loading and
//! evaluating them lives in `signalbox-rules`, which depends on this crate.

use crate::ids::{CircuitId, MachineId, SignalId};
use crate::point_machine::PointPosition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlMode {
    And,
    Or,
}

/// A condition gating a rule. Segment-occupancy conditions are reserved for
/// future use (§4.3) and are treated as trivially satisfied by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    PointMachinePosition { point_machine: MachineId, position: PointPosition },
    SegmentOccupancy { segment_id: CircuitId, occupied: bool },
}

/// One entry of a signal's rule list: `{when_aspect, conditions[], allows{}}`.
///
/// `allows` maps a controlled signal id to the list of aspect strings
/// (main or composite encodings, per `CompositeAspect::encode`) that signal
/// may show while this rule's controller is in `when_aspect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterlockingRule {
    pub when_aspect: String,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub allows: HashMap<SignalId, Vec<String>>,
}

/// A signal's entry in the rule document: its type and its place in the
/// controller graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRuleConfig {
    #[serde(default)]
    pub independent: bool,
    #[serde(default = "default_control_mode")]
    pub control_mode: ControlMode,
    #[serde(default)]
    pub controlled_by: Vec<SignalId>,
    #[serde(default)]
    pub rules: Vec<InterlockingRule>,
}

fn default_control_mode() -> ControlMode {
    ControlMode::And
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOverlapDefinition {
    pub signal_id: SignalId,
    pub overlap_circuits: Vec<CircuitId>,
    pub release_trigger_circuits: Vec<CircuitId>,
    pub overlap_distance_m: f64,
    pub timed_release_s: u32,
}

/// A directed edge of the route-search graph; exists only while the named
/// point machine is in the named position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCircuitEdge {
    pub from_circuit: CircuitId,
    pub to_circuit: CircuitId,
    pub side: crate::route::Direction,
    pub condition_point_machine: MachineId,
    pub condition_position: PointPosition,
    pub weight: f64,
}
