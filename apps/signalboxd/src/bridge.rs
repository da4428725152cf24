//! Bridges the Change Distributor's `TrackCircuitUpdated` events to the
//! Interlocking Service's `react_to_track_occupancy_change` hook (§4.8).
//!
//! The distributor only reports that a circuit's fingerprint changed, not
//! the before/after occupancy the reactive hook needs; this module is the
//! thin piece of app-level wiring that keeps the last-seen occupancy per
//! circuit and turns a fingerprint change into the `(was_occupied,
//! is_occupied)` pair §4.6 reacts to. It is deliberately not part of
//! `signalbox-distributor` or `signalbox-service`: neither library needs to
//! know the other exists.

use signalbox_distributor::{ChangeEvent, Distributor};
use signalbox_service::InterlockingService;
use signalbox_store::StoreGateway;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

pub fn spawn<G: StoreGateway>(distributor: Arc<Distributor<G>>, service: Arc<InterlockingService<G>>) {
    let mut events = distributor.subscribe_events();
    let last_occupied: Mutex<HashMap<String, bool>> = Mutex::new(HashMap::new());

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "bridge lagged behind distributor event stream");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            };

            let ChangeEvent::TrackCircuitUpdated(circuit_id) = event else { continue };
            if let Err(err) = handle_circuit_update(&service, &last_occupied, &circuit_id).await {
                error!(circuit_id, %err, "failed to react to track-circuit occupancy change");
            }
        }
    });
}

async fn handle_circuit_update<G: StoreGateway>(
    service: &InterlockingService<G>,
    last_occupied: &Mutex<HashMap<String, bool>>,
    circuit_id: &str,
) -> anyhow::Result<()> {
    let circuit = service.gateway().get_track_circuit(circuit_id).await?;
    let was_occupied = {
        let mut cache = last_occupied.lock().await;
        cache.insert(circuit_id.to_string(), circuit.is_occupied).unwrap_or(circuit.is_occupied)
    };

    if was_occupied == circuit.is_occupied {
        return Ok(());
    }

    for segment in service.gateway().list_segments_by_circuit(circuit_id).await? {
        service.react_to_track_occupancy_change(&segment.segment_id, was_occupied, circuit.is_occupied).await?;
    }
    Ok(())
}
