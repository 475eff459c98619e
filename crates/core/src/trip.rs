//! The trip record: one truck run carrying one or more loads.

use crate::ids::{DriverId, OwnerId, TripId};
use serde::{Deserialize, Serialize};

/// One truck run. Load membership is resolved through `Load::trip_id`
/// plus the store's list-by-trip query; the trip itself only tracks the
/// delivery pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub driver_id: DriverId,
    pub owner_id: OwnerId,
    /// The delivery slot currently open. Starts at 1 and only ever
    /// increases, and only past a slot once a load holding it completed.
    pub current_delivery_index: u32,
    /// Optimistic concurrency token bumped by every store write. Racing
    /// delivery starters serialize on this.
    pub version: u64,
}

impl Trip {
    pub fn new(owner_id: OwnerId, driver_id: DriverId) -> Self {
        Self {
            id: TripId::new(),
            driver_id,
            owner_id,
            current_delivery_index: 1,
            version: 0,
        }
    }
}
