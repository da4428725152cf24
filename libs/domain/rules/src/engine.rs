//! The rule engine: composite-aspect matching and controller evaluation.

use crate::document::{RuleContext, RuleDocument};
use signalbox_model::{ControlMode, CompositeAspect, InterlockingRule, Outcome, RuleCondition, SignalId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleEngineError {
    #[error("no rule document entry for signal {0}")]
    UnknownSignal(SignalId),
}

pub struct RuleEngine {
    document: RuleDocument,
}

impl RuleEngine {
    pub fn new(document: RuleDocument) -> Self {
        Self { document }
    }

    pub fn is_independent(&self, signal_id: &str) -> bool {
        self.document.get(signal_id).map(|cfg| cfg.independent).unwrap_or(false)
    }

    /// Rules whose `when_aspect` matches `aspect` and whose conditions
    /// currently hold, for the named controlling signal.
    fn applicable_rules<'a>(
        &'a self,
        controller: &str,
        aspect: CompositeAspect,
        ctx: &RuleContext,
    ) -> Vec<&'a InterlockingRule> {
        let Some(cfg) = self.document.get(controller) else {
            return Vec::new();
        };
        cfg.rules
            .iter()
            .filter(|rule| CompositeAspect::decode(&rule.when_aspect) == Some(aspect))
            .filter(|rule| conditions_hold(&rule.conditions, ctx))
            .collect()
    }

    /// `validate_aspect_change(signal, current, requested)` of §4.3.
    ///
    /// `current` is accepted for interface symmetry but is not itself
    /// consulted: only the requested aspect is checked against each
    /// controller's `allows` map.
    pub fn validate_aspect_change(
        &self,
        signal_id: &str,
        _current: CompositeAspect,
        requested: CompositeAspect,
        ctx: &RuleContext,
    ) -> Outcome<()> {
        if self.is_independent(signal_id) {
            return Outcome::Allowed(());
        }

        let Some(cfg) = self.document.get(signal_id) else {
            return Outcome::blocked("RULE_ENGINE_UNKNOWN_SIGNAL", format!("no rule configuration for signal {signal_id}"));
        };

        if cfg.controlled_by.is_empty() {
            return Outcome::Allowed(());
        }

        let requested_encoded = requested.encode();
        let mut any_disallowed = None;
        let mut any_allowed = false;

        for controller in &cfg.controlled_by {
            let Some(&controller_aspect) = ctx.controller_aspects.get(controller) else {
                // Can't prove the controller is safe without its current aspect: block.
                return Outcome::blocked(
                    "CONTROLLER_ASPECT_UNKNOWN",
                    format!("current aspect for controller {controller} was not supplied"),
                )
                .with_entity(controller);
            };

            let rules = self.applicable_rules(controller, controller_aspect, ctx);
            if rules.is_empty() {
                // No applicable rule for this controller's current aspect: it abstains.
                any_allowed = true;
                continue;
            }

            let allowed_by_controller = rules
                .iter()
                .any(|rule| rule.allows.get(signal_id).is_some_and(|aspects| aspects.iter().any(|a| a == &requested_encoded)));

            if allowed_by_controller {
                any_allowed = true;
            } else {
                any_disallowed.get_or_insert((controller.clone(), controller_aspect));
            }
        }

        match cfg.control_mode {
            ControlMode::And => {
                if let Some((controller, aspect)) = any_disallowed {
                    return Outcome::blocked(
                        "CONTROLLER_RESTRICTION",
                        format!("controller {controller} in {aspect} does not permit {requested_encoded}"),
                    )
                    .with_entity(controller);
                }
                Outcome::Allowed(())
            }
            ControlMode::Or => {
                if any_allowed {
                    Outcome::Allowed(())
                } else {
                    let (controller, aspect) = any_disallowed.unwrap_or_else(|| (signal_id.to_string(), requested));
                    Outcome::blocked(
                        "CONTROLLER_RESTRICTION",
                        format!("no controller permits {requested_encoded} (last checked: {controller} in {aspect})"),
                    )
                    .with_entity(controller)
                }
            }
        }
    }

    /// `permitted_aspects(controller, controller_aspect, controlled)` — forward
    /// computation of what a controller currently permits, e.g. for UI previews.
    pub fn permitted_aspects(&self, controller: &str, controller_aspect: CompositeAspect, controlled: &str, ctx: &RuleContext) -> Vec<String> {
        let mut aspects: Vec<String> = self
            .applicable_rules(controller, controller_aspect, ctx)
            .into_iter()
            .filter_map(|rule| rule.allows.get(controlled))
            .flatten()
            .cloned()
            .collect();
        aspects.sort();
        aspects.dedup();
        aspects
    }
}

fn conditions_hold(conditions: &[RuleCondition], ctx: &RuleContext) -> bool {
    conditions.iter().all(|condition| match condition {
        RuleCondition::PointMachinePosition { point_machine, position } => {
            ctx.point_positions.get(point_machine).is_some_and(|actual| actual == position)
        }
        // Reserved for future use (§4.3); trivially satisfied until implemented.
        RuleCondition::SegmentOccupancy { .. } => true,
    })
}

trait WithEntity {
    #[must_use]
    fn with_entity(self, entity: impl Into<String>) -> Self;
}

impl<T> WithEntity for Outcome<T> {
    fn with_entity(self, entity: impl Into<String>) -> Self {
        match self {
            Outcome::Blocked(reason) => Outcome::Blocked(reason.with_entities([entity.into()])),
            allowed => allowed,
        }
    }
}
