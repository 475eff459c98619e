//! Trip-level delivery sequencer.
//!
//! Serializes delivery completion across the loads sharing one trip. The
//! trip's `current_delivery_index` is a fast path only; the authoritative
//! answer is always the full scan over sibling loads, which lets the
//! pointer lag and self-correct.

use crate::api::DeliveryOrderDecision;
use crate::error::{EngineError, Result};
use crate::policy::DELIVERY_ORDER_GATE;
use haulflow_core::{Load, Trip};
use haulflow_storage::{LoadStore, StorageError, TripStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Attempts to serialize racing delivery starters on the trip version
/// before giving up with a retryable conflict.
const START_ATTEMPTS: usize = 3;

pub struct DeliverySequencer {
    loads: Arc<dyn LoadStore>,
    trips: Arc<dyn TripStore>,
}

impl DeliverySequencer {
    pub fn new(loads: Arc<dyn LoadStore>, trips: Arc<dyn TripStore>) -> Self {
        Self { loads, trips }
    }

    /// Whether the given load may start delivery right now. Fails open:
    /// a store failure yields "allowed" rather than stranding a driver.
    pub async fn check_delivery_order(&self, load: &Load) -> DeliveryOrderDecision {
        match self.check_inner(load).await {
            Ok((decision, _)) => decision,
            Err(err) => {
                DELIVERY_ORDER_GATE.swallow("check_delivery_order", &err);
                DeliveryOrderDecision::allowed()
            }
        }
    }

    /// Full ordering check. Also returns the trip snapshot observed during
    /// the check so `authorize_start` can serialize on its version.
    async fn check_inner(
        &self,
        load: &Load,
    ) -> std::result::Result<(DeliveryOrderDecision, Option<Trip>), StorageError> {
        let Some(order) = load.delivery_order else {
            return Ok((DeliveryOrderDecision::allowed(), None));
        };
        let Some(trip_id) = load.trip_id else {
            // Ordering only applies within a trip.
            return Ok((DeliveryOrderDecision::allowed(), None));
        };

        let trip = self.trips.get_trip(load.owner_id, trip_id).await?;
        if order <= trip.current_delivery_index {
            return Ok((DeliveryOrderDecision::allowed(), Some(trip)));
        }

        // The pointer says an earlier slot is still open. Scan siblings for
        // an actually-unfinished earlier load; if none exists the pointer
        // merely lags and the load may proceed.
        let siblings = self.loads.loads_for_trip(load.owner_id, trip_id).await?;
        let blocking = siblings
            .iter()
            .filter(|s| s.id != load.id && !s.status.is_terminal())
            .filter_map(|s| s.delivery_order.map(|o| (o, s)))
            .filter(|(o, _)| *o < order)
            .min_by_key(|(o, _)| *o);

        match blocking {
            Some((o, s)) => {
                let reason = format!("{} (stop {o}) must be delivered first", s.display_label());
                Ok((DeliveryOrderDecision::blocked(reason, s.id), Some(trip)))
            }
            None => Ok((DeliveryOrderDecision::allowed(), Some(trip))),
        }
    }

    /// Gate for `StartDelivery`. A passing ordered check bumps the trip
    /// version observed during the check so two racing starters cannot
    /// both slip through; a conflict reruns the check.
    pub async fn authorize_start(&self, load: &Load) -> Result<()> {
        if load.delivery_order.is_none() {
            return Ok(());
        }

        for attempt in 0..START_ATTEMPTS {
            let (decision, trip) = match self.check_inner(load).await {
                Ok(result) => result,
                Err(err) => {
                    DELIVERY_ORDER_GATE.swallow("authorize_start", &err);
                    return Ok(());
                }
            };

            if !decision.allowed {
                return Err(EngineError::OrderViolation {
                    reason: decision
                        .reason
                        .unwrap_or_else(|| "an earlier stop is still open".to_string()),
                    blocking_load: decision.blocking_load,
                });
            }

            let Some(trip) = trip else {
                return Ok(());
            };

            let expected = trip.version;
            match self.trips.put_trip(load.owner_id, trip, expected).await {
                Ok(_) => return Ok(()),
                Err(StorageError::Conflict) => {
                    debug!(load_id = %load.id, attempt, "trip version moved during start authorization, re-checking");
                    continue;
                }
                Err(err) => {
                    DELIVERY_ORDER_GATE.swallow("authorize_start", &err);
                    return Ok(());
                }
            }
        }

        Err(StorageError::Conflict.into())
    }

    /// Move the trip pointer past a completed slot. Best effort and
    /// idempotent; never decrements, and failures are swallowed because
    /// the next ordering check self-corrects via the full scan.
    pub async fn advance_delivery_index(&self, completed: &Load) {
        let Some(order) = completed.delivery_order else {
            return;
        };
        let Some(trip_id) = completed.trip_id else {
            return;
        };

        for _ in 0..2 {
            let mut trip = match self.trips.get_trip(completed.owner_id, trip_id).await {
                Ok(trip) => trip,
                Err(err) => {
                    warn!(load_id = %completed.id, %err, "could not read trip to advance delivery index");
                    return;
                }
            };

            if trip.current_delivery_index != order {
                // Already past this slot, or another process moved it.
                return;
            }

            trip.current_delivery_index = order + 1;
            let expected = trip.version;
            match self.trips.put_trip(completed.owner_id, trip, expected).await {
                Ok(trip) => {
                    debug!(trip_id = %trip_id, index = trip.current_delivery_index, "advanced delivery index");
                    return;
                }
                Err(StorageError::Conflict) => continue,
                Err(err) => {
                    warn!(load_id = %completed.id, %err, "could not advance delivery index");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulflow_core::{DriverId, LoadSource, LoadStatus, OwnerId, PostingType, TripId};
    use haulflow_storage::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        sequencer: DeliverySequencer,
        owner: OwnerId,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let sequencer = DeliverySequencer::new(
            Arc::new(store.clone()) as Arc<dyn LoadStore>,
            Arc::new(store.clone()) as Arc<dyn TripStore>,
        );
        Fixture {
            store,
            sequencer,
            owner: OwnerId::new(),
        }
    }

    fn trip(fx: &Fixture) -> Trip {
        let trip = Trip::new(fx.owner, DriverId::new());
        fx.store.insert_trip(trip.clone());
        trip
    }

    fn ordered_load(fx: &Fixture, trip_id: TripId, order: u32, status: LoadStatus) -> Load {
        let mut load = Load::new(fx.owner, LoadSource::OwnCustomer, PostingType::Load);
        load.trip_id = Some(trip_id);
        load.delivery_order = Some(order);
        load.status = status;
        fx.store.insert_load(load.clone());
        load
    }

    #[tokio::test]
    async fn unordered_load_is_always_allowed() {
        let fx = fixture();
        let mut load = Load::new(fx.owner, LoadSource::OwnCustomer, PostingType::Load);
        load.status = LoadStatus::Loaded;
        assert!(fx.sequencer.check_delivery_order(&load).await.allowed);
    }

    #[tokio::test]
    async fn load_without_trip_is_allowed() {
        let fx = fixture();
        let mut load = Load::new(fx.owner, LoadSource::OwnCustomer, PostingType::Load);
        load.delivery_order = Some(2);
        assert!(fx.sequencer.check_delivery_order(&load).await.allowed);
    }

    #[tokio::test]
    async fn open_slot_is_allowed_and_later_slot_blocked() {
        let fx = fixture();
        let trip = trip(&fx);
        let first = ordered_load(&fx, trip.id, 1, LoadStatus::Loaded);
        let second = ordered_load(&fx, trip.id, 2, LoadStatus::Loaded);

        assert!(fx.sequencer.check_delivery_order(&first).await.allowed);

        let decision = fx.sequencer.check_delivery_order(&second).await;
        assert!(!decision.allowed);
        assert_eq!(decision.blocking_load, Some(first.id));
        assert!(decision.reason.unwrap().contains("stop 1"));
    }

    #[tokio::test]
    async fn blocking_reason_names_the_customer() {
        let fx = fixture();
        let trip = trip(&fx);
        let mut first = ordered_load(&fx, trip.id, 1, LoadStatus::Loaded);
        first.customer_name = Some("R. Alvarez".to_string());
        fx.store.insert_load(first.clone());
        let second = ordered_load(&fx, trip.id, 2, LoadStatus::Loaded);

        let decision = fx.sequencer.check_delivery_order(&second).await;
        assert!(decision.reason.unwrap().contains("R. Alvarez"));
    }

    #[tokio::test]
    async fn lagging_pointer_self_heals_when_earlier_slots_completed() {
        let fx = fixture();
        let trip = trip(&fx);
        ordered_load(&fx, trip.id, 1, LoadStatus::Delivered);
        let second = ordered_load(&fx, trip.id, 2, LoadStatus::Loaded);

        // Pointer still says slot 1 is open, but its load completed.
        let decision = fx.sequencer.check_delivery_order(&second).await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn storage_completed_counts_as_complete() {
        let fx = fixture();
        let trip = trip(&fx);
        ordered_load(&fx, trip.id, 1, LoadStatus::StorageCompleted);
        let second = ordered_load(&fx, trip.id, 2, LoadStatus::Loaded);
        assert!(fx.sequencer.check_delivery_order(&second).await.allowed);
    }

    #[tokio::test]
    async fn check_fails_open_on_store_failure() {
        let fx = fixture();
        let trip = trip(&fx);
        let second = ordered_load(&fx, trip.id, 2, LoadStatus::Loaded);
        ordered_load(&fx, trip.id, 1, LoadStatus::Loaded);

        fx.store.set_fail_reads(true);
        assert!(fx.sequencer.check_delivery_order(&second).await.allowed);
    }

    #[tokio::test]
    async fn authorize_start_blocks_with_order_violation() {
        let fx = fixture();
        let trip = trip(&fx);
        let first = ordered_load(&fx, trip.id, 1, LoadStatus::Loaded);
        let second = ordered_load(&fx, trip.id, 2, LoadStatus::Loaded);

        let err = fx.sequencer.authorize_start(&second).await.unwrap_err();
        match err {
            EngineError::OrderViolation { blocking_load, .. } => {
                assert_eq!(blocking_load, Some(first.id));
            }
            other => panic!("expected OrderViolation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn authorize_start_bumps_the_trip_version() {
        let fx = fixture();
        let trip = trip(&fx);
        let first = ordered_load(&fx, trip.id, 1, LoadStatus::Loaded);

        fx.sequencer.authorize_start(&first).await.unwrap();
        let stored = fx.store.get_trip(fx.owner, trip.id).await.unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn advance_increments_only_the_open_slot() {
        let fx = fixture();
        let trip = trip(&fx);
        let first = ordered_load(&fx, trip.id, 1, LoadStatus::Delivered);

        fx.sequencer.advance_delivery_index(&first).await;
        let stored = fx.store.get_trip(fx.owner, trip.id).await.unwrap();
        assert_eq!(stored.current_delivery_index, 2);

        // A second advance for the same load is a no-op.
        fx.sequencer.advance_delivery_index(&first).await;
        let stored = fx.store.get_trip(fx.owner, trip.id).await.unwrap();
        assert_eq!(stored.current_delivery_index, 2);
    }

    #[tokio::test]
    async fn advance_is_a_noop_for_unordered_loads() {
        let fx = fixture();
        let trip = trip(&fx);
        let mut load = Load::new(fx.owner, LoadSource::OwnCustomer, PostingType::Load);
        load.trip_id = Some(trip.id);
        load.status = LoadStatus::Delivered;
        fx.store.insert_load(load.clone());

        fx.sequencer.advance_delivery_index(&load).await;
        let stored = fx.store.get_trip(fx.owner, trip.id).await.unwrap();
        assert_eq!(stored.current_delivery_index, 1);
    }

    #[tokio::test]
    async fn advance_swallows_store_failures() {
        let fx = fixture();
        let trip = trip(&fx);
        let first = ordered_load(&fx, trip.id, 1, LoadStatus::Delivered);

        fx.store.set_fail_writes(true);
        fx.sequencer.advance_delivery_index(&first).await;

        fx.store.set_fail_writes(false);
        let stored = fx.store.get_trip(fx.owner, trip.id).await.unwrap();
        assert_eq!(stored.current_delivery_index, 1);
    }
}
