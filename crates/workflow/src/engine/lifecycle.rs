//! Lifecycle transitions: the load state machine's guard and effect table.
//!
//! Forward-only: pending, accepted, loading, loaded, in_transit, delivered,
//! with the pickup-completion path jumping straight to loaded.
//! Each transition reads the current snapshot, validates the precondition,
//! writes the new state under the caller's tenant, then notifies.

use super::WorkflowEngine;
use crate::api::{Accessorial, ContractDetails, OperationResult, PaymentOnDelivery, PickupDetails};
use crate::auth::AuthContext;
use crate::error::{EngineError, Result};
use chrono::Utc;
use haulflow_core::{Load, LoadId, LoadSource, LoadStatus, PhotoRef, PostingType};
use haulflow_storage::LoadEventKind;
use tracing::info;

fn require_status(load: &Load, expected: LoadStatus, operation: &'static str) -> Result<()> {
    if load.status != expected {
        return Err(EngineError::InvalidTransition {
            from: load.status,
            operation,
        });
    }
    Ok(())
}

fn linehaul_cents(actual_cuft: f64, rate_per_cuft_cents: i64) -> i64 {
    (actual_cuft * rate_per_cuft_cents as f64).round() as i64
}

fn accessorial_sum_cents(accessorials: &[Accessorial]) -> i64 {
    accessorials.iter().map(|a| a.amount_cents).sum()
}

impl WorkflowEngine {
    /// Moves a pending load to accepted.
    pub async fn accept_load(&self, ctx: &AuthContext, load_id: LoadId) -> OperationResult {
        self.try_accept_load(ctx, load_id).await.into()
    }

    pub async fn try_accept_load(&self, ctx: &AuthContext, load_id: LoadId) -> Result<Load> {
        let (profile, mut load) = self.caller_load(ctx, load_id).await?;
        require_status(&load, LoadStatus::Pending, "accept")?;

        load.status = LoadStatus::Accepted;
        load.accepted_at = Some(Utc::now());
        let expected = load.version;
        let stored = self.loads.put_load(profile.owner_id, load, expected).await?;

        info!(load_id = %stored.id, "load accepted");
        self.notify(LoadEventKind::Accepted, &stored);
        Ok(stored)
    }

    /// Moves an accepted load to loading, recording the starting measurement.
    pub async fn start_loading(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        starting_cuft: f64,
        photo_ref: Option<PhotoRef>,
    ) -> OperationResult {
        self.try_start_loading(ctx, load_id, starting_cuft, photo_ref)
            .await
            .into()
    }

    pub async fn try_start_loading(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        starting_cuft: f64,
        photo_ref: Option<PhotoRef>,
    ) -> Result<Load> {
        let (profile, mut load) = self.caller_load(ctx, load_id).await?;
        require_status(&load, LoadStatus::Accepted, "start_loading")?;

        load.status = LoadStatus::Loading;
        load.loading_started_at = Some(Utc::now());
        load.starting_cuft = Some(starting_cuft);
        if photo_ref.is_some() {
            load.loading_start_photo = photo_ref;
        }
        let expected = load.version;
        let stored = self.loads.put_load(profile.owner_id, load, expected).await?;

        info!(load_id = %stored.id, starting_cuft, "loading started");
        self.notify(LoadEventKind::LoadingStarted, &stored);
        Ok(stored)
    }

    /// Moves a loading load to loaded, deriving the actual CUFT loaded. The
    /// photo may be deferred when the co-load heuristic says a sibling will
    /// carry it.
    pub async fn finish_loading(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        ending_cuft: Option<f64>,
        photo_ref: Option<PhotoRef>,
    ) -> OperationResult {
        self.try_finish_loading(ctx, load_id, ending_cuft, photo_ref)
            .await
            .into()
    }

    pub async fn try_finish_loading(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        ending_cuft: Option<f64>,
        photo_ref: Option<PhotoRef>,
    ) -> Result<Load> {
        let (profile, mut load) = self.caller_load(ctx, load_id).await?;
        require_status(&load, LoadStatus::Loading, "finish_loading")?;

        let ending = ending_cuft
            .or(load.ending_cuft)
            .ok_or_else(|| EngineError::Validation("ending_cuft is required".to_string()))?;

        load.status = LoadStatus::Loaded;
        load.loading_finished_at = Some(Utc::now());
        load.ending_cuft = Some(ending);
        load.derive_actual_cuft();
        if photo_ref.is_some() {
            load.loading_report_photo = photo_ref;
        }
        let expected = load.version;
        let stored = self.loads.put_load(profile.owner_id, load, expected).await?;

        info!(load_id = %stored.id, actual_cuft = ?stored.actual_cuft_loaded, "loading finished");
        self.notify(LoadEventKind::LoadingFinished, &stored);
        Ok(stored)
    }

    /// Contract-details path for partner and marketplace loads. No status
    /// change; this only opens the ready-for-delivery gate.
    pub async fn save_contract_details(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        details: ContractDetails,
    ) -> OperationResult {
        self.try_save_contract_details(ctx, load_id, details)
            .await
            .into()
    }

    pub async fn try_save_contract_details(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        details: ContractDetails,
    ) -> Result<Load> {
        let (profile, mut load) = self.caller_load(ctx, load_id).await?;
        if !matches!(
            load.load_source,
            LoadSource::Partner | LoadSource::Marketplace
        ) {
            return Err(EngineError::Validation(
                "contract details only apply to partner and marketplace loads".to_string(),
            ));
        }
        if load.posting_type == PostingType::Pickup {
            return Err(EngineError::Validation(
                "pickup postings record contract figures through pickup completion".to_string(),
            ));
        }
        require_status(&load, LoadStatus::Loaded, "save_contract_details")?;
        let actual = load.actual_cuft_loaded.ok_or_else(|| {
            EngineError::Validation("loading must be finished before contract details".to_string())
        })?;

        let linehaul = linehaul_cents(actual, details.rate_per_cuft_cents);
        let accessorial_total = accessorial_sum_cents(&details.accessorials);
        load.rate_per_cuft_cents = Some(details.rate_per_cuft_cents);
        load.linehaul_total_cents = Some(linehaul);
        load.accessorial_total_cents = Some(accessorial_total);
        load.balance_due_on_delivery_cents =
            Some(linehaul + accessorial_total - details.amount_prepaid_cents);
        load.contract_details_entered_at = Some(Utc::now());

        let expected = load.version;
        let stored = self.loads.put_load(profile.owner_id, load, expected).await?;
        info!(load_id = %stored.id, linehaul_cents = linehaul, "contract details saved");
        Ok(stored)
    }

    /// Pickup-completion path: combines the finish-loading effects with
    /// contract computation and payment-at-pickup recording, and jumps the
    /// load straight to loaded.
    pub async fn complete_pickup(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        details: PickupDetails,
    ) -> OperationResult {
        self.try_complete_pickup(ctx, load_id, details).await.into()
    }

    pub async fn try_complete_pickup(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        details: PickupDetails,
    ) -> Result<Load> {
        let (profile, mut load) = self.caller_load(ctx, load_id).await?;
        if load.posting_type != PostingType::Pickup {
            return Err(EngineError::Validation(
                "pickup completion only applies to pickup postings".to_string(),
            ));
        }

        let now = Utc::now();
        match load.status {
            LoadStatus::Loading => {}
            // A pickup visit may combine start and finish of loading in
            // one stop; the payload must then carry the start measurement.
            LoadStatus::Accepted => {
                let starting = details.starting_cuft.ok_or_else(|| {
                    EngineError::Validation(
                        "starting_cuft is required when completing pickup from accepted"
                            .to_string(),
                    )
                })?;
                load.starting_cuft = Some(starting);
                load.loading_started_at = Some(now);
            }
            from => {
                return Err(EngineError::InvalidTransition {
                    from,
                    operation: "complete_pickup",
                });
            }
        }
        if let Some(starting) = details.starting_cuft {
            load.starting_cuft = Some(starting);
        }
        if load.starting_cuft.is_none() {
            return Err(EngineError::Validation(
                "starting_cuft was never recorded".to_string(),
            ));
        }

        load.ending_cuft = Some(details.ending_cuft);
        load.derive_actual_cuft();
        load.loading_finished_at = Some(now);
        if details.photo_ref.is_some() {
            load.loading_report_photo = details.photo_ref;
        }

        let actual = load.actual_cuft_loaded.ok_or_else(|| {
            EngineError::Validation("could not derive actual cuft loaded".to_string())
        })?;
        let linehaul = linehaul_cents(actual, details.rate_per_cuft_cents);
        let accessorial_total = accessorial_sum_cents(&details.accessorials);
        let contract_balance_due = linehaul + accessorial_total;
        load.rate_per_cuft_cents = Some(details.rate_per_cuft_cents);
        load.linehaul_total_cents = Some(linehaul);
        load.accessorial_total_cents = Some(accessorial_total);
        load.amount_collected_at_pickup_cents = Some(details.amount_collected_cents);
        load.payment_method = details.payment_method;
        // The remainder owed at delivery; zero or negative means nothing
        // further is owed.
        load.balance_due_on_delivery_cents =
            Some(contract_balance_due - details.amount_collected_cents);

        load.status = LoadStatus::Loaded;
        load.pickup_completed_at = Some(now);

        let expected = load.version;
        let stored = self.loads.put_load(profile.owner_id, load, expected).await?;
        info!(load_id = %stored.id, balance_cents = ?stored.balance_due_on_delivery_cents, "pickup completed");
        self.notify(LoadEventKind::PickupCompleted, &stored);
        Ok(stored)
    }

    /// Moves a loaded load to in_transit, gated by the delivery sequencer.
    pub async fn start_delivery(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        payment: Option<PaymentOnDelivery>,
    ) -> OperationResult {
        self.try_start_delivery(ctx, load_id, payment).await.into()
    }

    pub async fn try_start_delivery(
        &self,
        ctx: &AuthContext,
        load_id: LoadId,
        payment: Option<PaymentOnDelivery>,
    ) -> Result<Load> {
        let (profile, mut load) = self.caller_load(ctx, load_id).await?;
        require_status(&load, LoadStatus::Loaded, "start_delivery")?;

        self.sequencer().authorize_start(&load).await?;

        load.status = LoadStatus::InTransit;
        load.delivery_started_at = Some(Utc::now());
        if let Some(payment) = payment {
            load.amount_collected_on_delivery_cents = Some(payment.amount_collected_cents);
            load.payment_method = Some(payment.method);
        }
        let expected = load.version;
        let stored = self.loads.put_load(profile.owner_id, load, expected).await?;

        info!(load_id = %stored.id, order = ?stored.delivery_order, "delivery started");
        self.notify(LoadEventKind::DeliveryStarted, &stored);
        Ok(stored)
    }

    /// Moves an in_transit load to delivered, then best-effort pointer advance.
    pub async fn complete_delivery(&self, ctx: &AuthContext, load_id: LoadId) -> OperationResult {
        self.try_complete_delivery(ctx, load_id).await.into()
    }

    pub async fn try_complete_delivery(&self, ctx: &AuthContext, load_id: LoadId) -> Result<Load> {
        let (profile, mut load) = self.caller_load(ctx, load_id).await?;
        require_status(&load, LoadStatus::InTransit, "complete_delivery")?;

        load.status = LoadStatus::Delivered;
        load.delivery_finished_at = Some(Utc::now());
        let expected = load.version;
        let stored = self.loads.put_load(profile.owner_id, load, expected).await?;

        // Failure here is non-fatal: the next ordering check self-corrects.
        self.sequencer().advance_delivery_index(&stored).await;

        info!(load_id = %stored.id, "delivery completed");
        self.notify(LoadEventKind::DeliveryCompleted, &stored);
        Ok(stored)
    }
}
