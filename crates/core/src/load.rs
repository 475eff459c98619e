//! The load record: one shipment tracked from pickup through delivery.

use crate::ids::{CompanyId, DamageId, LoadId, OwnerId, TripId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a load. Transitions only move forward; the workflow
/// engine enforces the exact edge set, this enum only knows the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Pending,
    Accepted,
    Loading,
    Loaded,
    InTransit,
    Delivered,
    StorageCompleted,
}

impl LoadStatus {
    /// Position in the forward lifecycle order.
    pub fn rank(self) -> u8 {
        match self {
            LoadStatus::Pending => 0,
            LoadStatus::Accepted => 1,
            LoadStatus::Loading => 2,
            LoadStatus::Loaded => 3,
            LoadStatus::InTransit => 4,
            LoadStatus::Delivered => 5,
            LoadStatus::StorageCompleted => 5,
        }
    }

    /// Delivered and storage-completed loads accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadStatus::Delivered | LoadStatus::StorageCompleted)
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoadStatus::Pending => "pending",
            LoadStatus::Accepted => "accepted",
            LoadStatus::Loading => "loading",
            LoadStatus::Loaded => "loaded",
            LoadStatus::InTransit => "in_transit",
            LoadStatus::Delivered => "delivered",
            LoadStatus::StorageCompleted => "storage_completed",
        };
        write!(f, "{s}")
    }
}

/// Where the load originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    OwnCustomer,
    Partner,
    Marketplace,
}

/// How the load was posted by dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingType {
    Pickup,
    Load,
    LiveLoad,
}

/// How a balance was collected. Opaque to the engine; recorded as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
    CardOnFile,
    Zelle,
    Other,
}

/// Opaque reference to a photo held by the external media store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef(pub String);

impl PhotoRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One documented pre-existing defect, owned by its parent load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageItem {
    pub id: DamageId,
    pub sticker_number: String,
    pub item_description: String,
    pub damage_description: String,
    pub photo_url: Option<String>,
    pub documented_at: DateTime<Utc>,
}

/// One shipment. Created as `pending` by an upstream posting process; the
/// engine only mutates it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub id: LoadId,
    pub owner_id: OwnerId,
    pub company_id: Option<CompanyId>,
    pub company_name: Option<String>,

    pub customer_name: Option<String>,
    pub delivery_city: Option<String>,
    pub delivery_state: Option<String>,

    pub status: LoadStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub loading_started_at: Option<DateTime<Utc>>,
    pub loading_finished_at: Option<DateTime<Utc>>,
    pub delivery_started_at: Option<DateTime<Utc>>,
    pub delivery_finished_at: Option<DateTime<Utc>>,

    pub load_source: LoadSource,
    pub posting_type: PostingType,
    pub pickup_completed_at: Option<DateTime<Utc>>,
    pub contract_details_entered_at: Option<DateTime<Utc>>,

    pub starting_cuft: Option<f64>,
    pub ending_cuft: Option<f64>,
    pub actual_cuft_loaded: Option<f64>,

    pub rate_per_cuft_cents: Option<i64>,
    pub linehaul_total_cents: Option<i64>,
    pub accessorial_total_cents: Option<i64>,
    pub balance_due_on_delivery_cents: Option<i64>,
    pub amount_collected_at_pickup_cents: Option<i64>,
    pub amount_collected_on_delivery_cents: Option<i64>,
    pub payment_method: Option<PaymentMethod>,

    pub trip_id: Option<TripId>,
    /// Required delivery slot within the trip; `None` means deliverable
    /// anytime.
    pub delivery_order: Option<u32>,

    pub loading_start_photo: Option<PhotoRef>,
    pub loading_report_photo: Option<PhotoRef>,

    pub pre_existing_damages: Vec<DamageItem>,

    /// Optimistic concurrency token bumped by every store write.
    pub version: u64,
}

impl Load {
    /// A fresh `pending` load, as the posting process would create it.
    pub fn new(owner_id: OwnerId, load_source: LoadSource, posting_type: PostingType) -> Self {
        Self {
            id: LoadId::new(),
            owner_id,
            company_id: None,
            company_name: None,
            customer_name: None,
            delivery_city: None,
            delivery_state: None,
            status: LoadStatus::Pending,
            accepted_at: None,
            loading_started_at: None,
            loading_finished_at: None,
            delivery_started_at: None,
            delivery_finished_at: None,
            load_source,
            posting_type,
            pickup_completed_at: None,
            contract_details_entered_at: None,
            starting_cuft: None,
            ending_cuft: None,
            actual_cuft_loaded: None,
            rate_per_cuft_cents: None,
            linehaul_total_cents: None,
            accessorial_total_cents: None,
            balance_due_on_delivery_cents: None,
            amount_collected_at_pickup_cents: None,
            amount_collected_on_delivery_cents: None,
            payment_method: None,
            trip_id: None,
            delivery_order: None,
            loading_start_photo: None,
            loading_report_photo: None,
            pre_existing_damages: Vec::new(),
            version: 0,
        }
    }

    /// Recompute `actual_cuft_loaded` from the start/end measurements.
    /// `actual = ending − starting` whenever both are known; never
    /// independently settable once both exist.
    pub fn derive_actual_cuft(&mut self) {
        if let (Some(start), Some(end)) = (self.starting_cuft, self.ending_cuft) {
            self.actual_cuft_loaded = Some(end - start);
        }
    }

    /// Contract details must be entered before the delivery gate opens for
    /// partner and marketplace loads that are not pickup postings.
    pub fn requires_contract_details(&self) -> bool {
        matches!(
            self.load_source,
            LoadSource::Partner | LoadSource::Marketplace
        ) && self.contract_details_entered_at.is_none()
            && self.posting_type != PostingType::Pickup
    }

    /// Pickup postings must go through the combined pickup-completion step.
    pub fn requires_pickup_completion(&self) -> bool {
        self.posting_type == PostingType::Pickup && self.pickup_completed_at.is_none()
    }

    /// Human-readable handle used when this load blocks another driver.
    /// Customer name first, then city/state, then the stop number.
    pub fn display_label(&self) -> String {
        if let Some(name) = &self.customer_name {
            return name.clone();
        }
        match (&self.delivery_city, &self.delivery_state) {
            (Some(city), Some(state)) => format!("{city}, {state}"),
            (Some(city), None) => city.clone(),
            _ => match self.delivery_order {
                Some(order) => format!("stop {order}"),
                None => format!("load {}", self.id),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_load() -> Load {
        Load::new(OwnerId::new(), LoadSource::OwnCustomer, PostingType::Load)
    }

    #[test]
    fn status_order_is_forward() {
        assert!(LoadStatus::Pending.rank() < LoadStatus::Accepted.rank());
        assert!(LoadStatus::Loaded.rank() < LoadStatus::InTransit.rank());
        assert!(LoadStatus::InTransit.rank() < LoadStatus::Delivered.rank());
        assert_eq!(
            LoadStatus::Delivered.rank(),
            LoadStatus::StorageCompleted.rank()
        );
    }

    #[test]
    fn terminal_states() {
        assert!(LoadStatus::Delivered.is_terminal());
        assert!(LoadStatus::StorageCompleted.is_terminal());
        assert!(!LoadStatus::InTransit.is_terminal());
    }

    #[test]
    fn derives_actual_cuft_when_both_measurements_known() {
        let mut load = sample_load();
        load.starting_cuft = Some(500.0);
        load.derive_actual_cuft();
        assert_eq!(load.actual_cuft_loaded, None);

        load.ending_cuft = Some(1200.0);
        load.derive_actual_cuft();
        assert_eq!(load.actual_cuft_loaded, Some(700.0));
    }

    #[test]
    fn contract_details_gate_only_for_partner_and_marketplace() {
        let mut load = sample_load();
        assert!(!load.requires_contract_details());

        load.load_source = LoadSource::Partner;
        assert!(load.requires_contract_details());

        load.contract_details_entered_at = Some(Utc::now());
        assert!(!load.requires_contract_details());

        load.contract_details_entered_at = None;
        load.posting_type = PostingType::Pickup;
        assert!(!load.requires_contract_details());
    }

    #[test]
    fn pickup_completion_gate() {
        let mut load = sample_load();
        assert!(!load.requires_pickup_completion());

        load.posting_type = PostingType::Pickup;
        assert!(load.requires_pickup_completion());

        load.pickup_completed_at = Some(Utc::now());
        assert!(!load.requires_pickup_completion());
    }

    #[test]
    fn display_label_prefers_customer_name() {
        let mut load = sample_load();
        load.delivery_order = Some(3);
        assert_eq!(load.display_label(), "stop 3");

        load.delivery_city = Some("Tulsa".to_string());
        load.delivery_state = Some("OK".to_string());
        assert_eq!(load.display_label(), "Tulsa, OK");

        load.customer_name = Some("R. Alvarez".to_string());
        assert_eq!(load.display_label(), "R. Alvarez");
    }
}
