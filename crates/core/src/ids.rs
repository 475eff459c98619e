//! Typed identifiers for domain records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a load (one shipment).
    LoadId
);
uuid_id!(
    /// Unique identifier for a trip (one truck run).
    TripId
);
uuid_id!(
    /// Unique identifier for a damage record embedded in a load.
    DamageId
);
uuid_id!(
    /// Tenant scope: the carrier account that owns a record.
    OwnerId
);
uuid_id!(
    /// Driver profile identifier within a tenant.
    DriverId
);
uuid_id!(
    /// The sending company on a co-loaded shipment.
    CompanyId
);
uuid_id!(
    /// Authenticated user identity, resolved to a driver profile.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(LoadId::new(), LoadId::new());
    }

    #[test]
    fn id_roundtrips_through_json() {
        let id = TripId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: TripId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn display_matches_inner_uuid() {
        let id = LoadId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }
}
