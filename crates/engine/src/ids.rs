//! Typed identifiers.
//!
//! Every entity is keyed by a UUID stored as text. The newtypes keep a mission
//! id from being passed where a vehicle id is expected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an id read back from storage.
            pub(crate) fn parse_stored(value: &str) -> Result<Self, EngineError> {
                value.parse()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| EngineError::InvalidData(format!("invalid {} id: {s}", $label)))
            }
        }
    };
}

typed_id!(VehicleId, "vehicle");
typed_id!(MissionId, "mission");
typed_id!(ExpenseId, "expense");
typed_id!(MaintenanceId, "maintenance");
typed_id!(
    /// Identifier of an insurance policy.
    InsuranceId,
    "insurance"
);
typed_id!(AccountId, "account");
typed_id!(MovementId, "movement");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        let id = VehicleId::new();
        let parsed: VehicleId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<MissionId>().unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidData("invalid mission id: not-a-uuid".to_string())
        );
    }
}
