//! Load execution workflow and delivery sequencing for haulflow.
//!
//! Tracks a load through pickup, loading, transit, and delivery, and
//! enforces that loads sharing one trip are delivered in the order
//! dispatch assigned. The persistence store and push pipeline are
//! external; see `haulflow-storage` for their contracts.

pub mod api;
pub mod auth;
pub mod coload;
pub mod damages;
pub mod engine;
pub mod error;
pub mod policy;
pub mod sequencer;

pub use api::{
    Accessorial, ContractDetails, ContractDetailsGate, DamagePatch, DeliveryOrderDecision,
    NewDamage, OperationResult, PaymentOnDelivery, PhotoRequirement, PickupCompletionGate,
    PickupDetails,
};
pub use auth::{AuthContext, DriverProfile, ProfileResolver, StaticProfiles};
pub use damages::UNDO_WINDOW;
pub use engine::WorkflowEngine;
pub use error::{EngineError, Result};
pub use policy::FailPolicy;
