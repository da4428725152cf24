//! The rule document: `signal_id -> {type, independent?, control_mode, controlled_by[], rules[]}`.

use signalbox_model::{MachineId, PointPosition, SignalId};
use signalbox_model::SignalRuleConfig;
use std::collections::HashMap;

pub type RuleDocument = HashMap<SignalId, SignalRuleConfig>;

/// Live state snapshots the rule engine needs to evaluate controllers, taken
/// by the caller (the Signal Branch) from the store before validating.
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub controller_aspects: HashMap<SignalId, signalbox_model::CompositeAspect>,
    pub point_positions: HashMap<MachineId, PointPosition>,
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_controller_aspect(mut self, signal_id: impl Into<SignalId>, aspect: signalbox_model::CompositeAspect) -> Self {
        self.controller_aspects.insert(signal_id.into(), aspect);
        self
    }

    #[must_use]
    pub fn with_point_position(mut self, machine_id: impl Into<MachineId>, position: PointPosition) -> Self {
        self.point_positions.insert(machine_id.into(), position);
        self
    }
}
