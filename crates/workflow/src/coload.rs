//! Company co-load photo heuristic.
//!
//! When several loads from one sending company ride the same trip, the
//! loading report only needs to be photographed once, by whichever load
//! finishes loading last. This heuristic decides whether the photo is
//! mandatory right now for a given load.

use crate::api::PhotoRequirement;
use crate::policy::PHOTO_REQUIREMENT_GATE;
use haulflow_core::{Load, LoadStatus, TripId};
use haulflow_storage::{LoadStore, StorageError};
use std::sync::Arc;

pub struct CoLoadHeuristic {
    loads: Arc<dyn LoadStore>,
}

impl CoLoadHeuristic {
    pub fn new(loads: Arc<dyn LoadStore>) -> Self {
        Self { loads }
    }

    /// Whether the loading-report photo is mandatory for `load` right now.
    /// Fails closed: on a store failure the photo is required.
    pub async fn photo_requirement(&self, load: &Load, trip_id: TripId) -> PhotoRequirement {
        match self.photo_requirement_inner(load, trip_id).await {
            Ok(requirement) => requirement,
            Err(err) => {
                PHOTO_REQUIREMENT_GATE.swallow("check_photo_requirement", &err);
                PhotoRequirement {
                    required: true,
                    siblings_still_loading: 0,
                    company_name: load.company_name.clone(),
                }
            }
        }
    }

    async fn photo_requirement_inner(
        &self,
        load: &Load,
        trip_id: TripId,
    ) -> Result<PhotoRequirement, StorageError> {
        // A single or own-customer load always needs its own photo.
        let Some(company_id) = load.company_id else {
            return Ok(PhotoRequirement {
                required: true,
                siblings_still_loading: 0,
                company_name: None,
            });
        };

        let siblings = self.loads.loads_for_trip(load.owner_id, trip_id).await?;
        let still_loading = siblings
            .iter()
            .filter(|s| s.id != load.id)
            .filter(|s| s.company_id == Some(company_id))
            .filter(|s| s.status == LoadStatus::Loading)
            .count() as u32;

        Ok(PhotoRequirement {
            // Last one still loading carries the photo duty.
            required: still_loading == 0,
            siblings_still_loading: still_loading,
            company_name: load.company_name.clone(),
        })
    }
}
