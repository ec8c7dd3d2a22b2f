//! Newtype identifiers for every entity in the data model.
//!
//! Every id wraps a UUID but is a distinct type, so a `VmId` can never be
//! passed where a `RangeId` is expected. Ids are resolved through the
//! repository interface (`cyroid-sdk`); this crate never stores pointers,
//! only ids, per the cyclic-reference guidance in the design notes.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! newtype_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

newtype_id!(PrincipalId, "Unique identifier for a principal (authenticated caller).");
newtype_id!(RangeId, "Unique identifier for a range.");
newtype_id!(NetworkId, "Unique identifier for a network.");
newtype_id!(VmId, "Unique identifier for a VM.");
newtype_id!(TemplateId, "Unique identifier for a VM template.");
newtype_id!(SnapshotId, "Unique identifier for a snapshot.");
newtype_id!(ArtifactId, "Unique identifier for an artifact.");
newtype_id!(MselId, "Unique identifier for an MSEL document.");
newtype_id!(InjectId, "Unique identifier for an inject.");
newtype_id!(EventId, "Unique identifier for an event log entry.");
newtype_id!(ConnectionId, "Unique identifier for a tracked connection.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        let id = VmId::new();
        let parsed: VmId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_ids_are_distinct_types() {
        let vm = VmId::new();
        let range = RangeId::new();
        assert_ne!(vm.as_uuid(), range.as_uuid());
    }
}
