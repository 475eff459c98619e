//! The workflow engine: the public operation surface of haulflow.
//!
//! Each operation resolves the caller, reads the current snapshot from the
//! store, applies the transition or answers the query, writes back scoped
//! to the caller's tenant, and fires the notifier without waiting for it.

mod lifecycle;

use crate::api::{
    ContractDetailsGate, DamagePatch, DeliveryOrderDecision, NewDamage, OperationResult,
    PhotoRequirement, PickupCompletionGate,
};
use crate::auth::{AuthContext, DriverProfile, ProfileResolver, require_profile};
use crate::coload::CoLoadHeuristic;
use crate::damages::DamageLedger;
use crate::error::Result;
use crate::policy::{CONTRACT_DETAILS_GATE, PICKUP_COMPLETION_GATE};
use crate::sequencer::DeliverySequencer;
use haulflow_core::{DamageId, DamageItem, Load, LoadId, TripId};
use haulflow_storage::{LoadEvent, LoadEventKind, LoadStore, Notifier, TripStore};
use std::sync::Arc;
use tracing::warn;

pub struct WorkflowEngine {
    loads: Arc<dyn LoadStore>,
    notifier: Arc<dyn Notifier>,
    profiles: Arc<dyn ProfileResolver>,
    sequencer: DeliverySequencer,
    heuristic: CoLoadHeuristic,
    damages: DamageLedger,
}

impl WorkflowEngine {
    pub fn new(
        loads: Arc<dyn LoadStore>,
        trips: Arc<dyn TripStore>,
        notifier: Arc<dyn Notifier>,
        profiles: Arc<dyn ProfileResolver>,
    ) -> Self {
        Self {
            sequencer: DeliverySequencer::new(Arc::clone(&loads), trips),
            heuristic: CoLoadHeuristic::new(Arc::clone(&loads)),
            damages: DamageLedger::new(Arc::clone(&loads)),
            loads,
            notifier,
            profiles,
        }
    }

    pub(crate) async fn caller(&self, ctx: &AuthContext) -> Result<DriverProfile> {
        require_profile(self.profiles.as_ref(), ctx).await
    }

    /// Resolve the caller and fetch the load under their tenant scope.
    pub(crate) async fn caller_load(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
    ) -> Result<(DriverProfile, Load)> {
        let profile = self.caller(ctx).await?;
        let load = self.loads.get_load(profile.owner_id, load_id).await?;
        Ok((profile, load))
    }

    /// Fire-and-forget event emission. Never awaited on the transition
    /// path; a send failure must not fail the transition.
    pub(crate) fn notify(&self, kind: LoadEventKind, load: &Load) {
        let event = LoadEvent::new(kind, load.id, load.owner_id);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier.send(event).await {
                warn!(%err, "load event notification dropped");
            }
        });
    }

    pub(crate) fn sequencer(&self) -> &DeliverySequencer {
        &self.sequencer
    }

    // ---- pure query guards -------------------------------------------

    /// Whether contract details must still be entered before the delivery
    /// gate opens. Fails open.
    pub async fn requires_contract_details(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
    ) -> ContractDetailsGate {
        match self.caller_load(ctx, load_id).await {
            Ok((_, load)) => ContractDetailsGate {
                required: load.requires_contract_details(),
                load_source: Some(load.load_source),
            },
            Err(err) => {
                CONTRACT_DETAILS_GATE.swallow("requires_contract_details", &err);
                ContractDetailsGate {
                    required: CONTRACT_DETAILS_GATE.default_required(),
                    load_source: None,
                }
            }
        }
    }

    /// Whether the combined pickup-completion step is still outstanding.
    /// Fails open.
    pub async fn requires_pickup_completion(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
    ) -> PickupCompletionGate {
        match self.caller_load(ctx, load_id).await {
            Ok((_, load)) => PickupCompletionGate {
                required: load.requires_pickup_completion(),
                posting_type: Some(load.posting_type),
            },
            Err(err) => {
                PICKUP_COMPLETION_GATE.swallow("requires_pickup_completion", &err);
                PickupCompletionGate {
                    required: PICKUP_COMPLETION_GATE.default_required(),
                    posting_type: None,
                }
            }
        }
    }

    /// Whether the load may start delivery right now. Fails open.
    pub async fn check_delivery_order(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
    ) -> DeliveryOrderDecision {
        match self.caller_load(ctx, load_id).await {
            Ok((_, load)) => self.sequencer.check_delivery_order(&load).await,
            Err(err) => {
                crate::policy::DELIVERY_ORDER_GATE.swallow("check_delivery_order", &err);
                DeliveryOrderDecision::allowed()
            }
        }
    }

    /// Whether the loading-report photo is mandatory right now. Fails
    /// closed: on failure the photo is required.
    pub async fn check_photo_requirement(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        trip_id: TripId,
    ) -> PhotoRequirement {
        match self.caller_load(ctx, load_id).await {
            Ok((_, load)) => self.heuristic.photo_requirement(&load, trip_id).await,
            Err(err) => {
                crate::policy::PHOTO_REQUIREMENT_GATE.swallow("check_photo_requirement", &err);
                PhotoRequirement {
                    required: crate::policy::PHOTO_REQUIREMENT_GATE.default_required(),
                    siblings_still_loading: 0,
                    company_name: None,
                }
            }
        }
    }

    // ---- damage sub-ledger -------------------------------------------

    pub async fn add_damage(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        new: NewDamage,
    ) -> OperationResult {
        self.try_add_damage(ctx, load_id, new).await.into()
    }

    pub async fn try_add_damage(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        new: NewDamage,
    ) -> Result<DamageItem> {
        let profile = self.caller(ctx).await?;
        self.damages.add(profile.owner_id, load_id, new).await
    }

    pub async fn update_damage(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        damage_id: DamageId,
        patch: DamagePatch,
    ) -> OperationResult {
        self.try_update_damage(ctx, load_id, damage_id, patch)
            .await
            .into()
    }

    pub async fn try_update_damage(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        damage_id: DamageId,
        patch: DamagePatch,
    ) -> Result<DamageItem> {
        let profile = self.caller(ctx).await?;
        self.damages
            .update(profile.owner_id, load_id, damage_id, patch)
            .await
    }

    /// Soft delete: hidden immediately, persisted after the undo window.
    pub async fn remove_damage(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        damage_id: DamageId,
    ) -> OperationResult {
        let result = match self.caller(ctx).await {
            Ok(profile) => self.damages.remove(profile.owner_id, load_id, damage_id).await,
            Err(err) => Err(err),
        };
        result.into()
    }

    /// Cancel a pending removal inside the undo window.
    pub async fn undo_remove_damage(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        damage_id: DamageId,
    ) -> OperationResult {
        let result = match self.caller(ctx).await {
            Ok(profile) => {
                self.damages
                    .undo_remove(profile.owner_id, load_id, damage_id)
                    .await
            }
            Err(err) => Err(err),
        };
        result.into()
    }

    /// The damage list as the driver should see it.
    pub async fn list_damages(&self, ctx: &AuthContext, load_id: LoadId) -> Result<Vec<DamageItem>> {
        let profile = self.caller(ctx).await?;
        self.damages.visible(profile.owner_id, load_id).await
    }
}
