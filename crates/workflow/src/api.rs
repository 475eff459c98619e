//! Request payloads and response envelopes for the operation surface.

use crate::error::EngineError;
use haulflow_core::{LoadId, LoadSource, PaymentMethod, PhotoRef, PostingType};
use serde::{Deserialize, Serialize};

/// Uniform envelope for mutating operations. Internal failures are caught
/// and reported here; the engine never surfaces a half-applied transition.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hint that retrying the same call may succeed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl OperationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            retryable: false,
        }
    }

    pub fn fail(err: &EngineError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            retryable: err.is_retryable(),
        }
    }
}

impl<T> From<crate::error::Result<T>> for OperationResult {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(_) => OperationResult::ok(),
            Err(err) => OperationResult::fail(&err),
        }
    }
}

/// An extra service charge added to the linehaul total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessorial {
    pub description: String,
    pub amount_cents: i64,
}

/// Contract figures entered after loading finishes on partner and
/// marketplace loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDetails {
    pub rate_per_cuft_cents: i64,
    pub accessorials: Vec<Accessorial>,
    /// Anything already collected upstream, subtracted from the balance.
    pub amount_prepaid_cents: i64,
}

/// Payload for the combined pickup-completion step on pickup postings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupDetails {
    /// Required when pickup completion is called straight from `accepted`,
    /// where no separate start-loading measurement exists.
    pub starting_cuft: Option<f64>,
    pub ending_cuft: f64,
    pub rate_per_cuft_cents: i64,
    pub accessorials: Vec<Accessorial>,
    pub amount_collected_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    pub photo_ref: Option<PhotoRef>,
}

/// Payment recorded when delivery starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOnDelivery {
    pub amount_collected_cents: i64,
    pub method: PaymentMethod,
}

/// Fields for a new damage record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDamage {
    pub sticker_number: String,
    pub item_description: String,
    pub damage_description: String,
    pub photo_url: Option<String>,
}

/// Partial update to a damage record. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DamagePatch {
    pub sticker_number: Option<String>,
    pub item_description: Option<String>,
    pub damage_description: Option<String>,
    pub photo_url: Option<Option<String>>,
}

/// Answer to `RequiresContractDetails`.
#[derive(Debug, Clone, Serialize)]
pub struct ContractDetailsGate {
    pub required: bool,
    pub load_source: Option<LoadSource>,
}

/// Answer to `RequiresPickupCompletion`.
#[derive(Debug, Clone, Serialize)]
pub struct PickupCompletionGate {
    pub required: bool,
    pub posting_type: Option<PostingType>,
}

/// Answer to `CheckDeliveryOrder`.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOrderDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking_load: Option<LoadId>,
}

impl DeliveryOrderDecision {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            blocking_load: None,
        }
    }

    pub fn blocked(reason: String, blocking_load: LoadId) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            blocking_load: Some(blocking_load),
        }
    }
}

/// Answer to `CheckPhotoRequirement`.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoRequirement {
    pub required: bool,
    pub siblings_still_loading: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}
