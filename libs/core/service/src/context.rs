//! Builds the rule engine's `RuleContext` snapshot from live store state.
//!
//! §4.3 leaves the snapshot's scope to the caller ("Live state snapshots
//! the rule engine needs ... taken by the caller"). The dependency graph
//! between signals is data (the rule document's `controlled_by` lists), not
//! something the facade tracks separately, so we snapshot every signal's
//! composite aspect and every point machine's position rather than
//! resolving the exact controller set per call.

use signalbox_rules::RuleContext;
use signalbox_store::{StoreError, StoreGateway};

pub async fn build_rule_context<G: StoreGateway>(gateway: &G) -> Result<RuleContext, StoreError> {
    let mut ctx = RuleContext::new();
    for signal in gateway.list_signals().await? {
        ctx = ctx.with_controller_aspect(signal.signal_id.clone(), signal.composite_aspect());
    }
    for machine in gateway.list_point_machines().await? {
        ctx = ctx.with_point_position(machine.machine_id.clone(), machine.current_position);
    }
    Ok(ctx)
}
