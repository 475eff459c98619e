//! Domain model for the haulflow load execution engine.
//!
//! Pure data and domain rules only; storage and workflow live in the
//! `haulflow-storage` and `haulflow-workflow` crates.

pub mod ids;
pub mod load;
pub mod trip;

pub use ids::{CompanyId, DamageId, DriverId, LoadId, OwnerId, TripId, UserId};
pub use load::{
    DamageItem, Load, LoadSource, LoadStatus, PaymentMethod, PhotoRef, PostingType,
};
pub use trip::Trip;
