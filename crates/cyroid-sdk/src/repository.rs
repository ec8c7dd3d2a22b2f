//! The Repository Interface (C9): the abstract storage contract every
//! domain crate's plans, executors, and filters are written against.
//!
//! `TopologyStore`, `MselStore`, and `JournalStore` are defined in their
//! owning crates to avoid a dependency cycle (§9's "store ids, resolve
//! through the repository" guidance); [`ArtifactStore`] and
//! [`PrincipalStore`] round out the remaining two entity families the
//! data model names that no existing crate owns. [`Repository`] is the
//! union of all five, auto-implemented for anything that implements each
//! part — callers depend on one trait object instead of five.

use cyroid_common::error::Result;
use cyroid_common::ids::{ArtifactId, PrincipalId, RangeId, VmId};
use cyroid_auth::Principal;
use cyroid_journal::JournalStore;
use cyroid_msel::MselStore;
use cyroid_topology::model::{Artifact, ArtifactPlacement};
use cyroid_topology::TopologyStore;

/// CRUD surface over uploaded artifacts and their per-VM placements (§3).
pub trait ArtifactStore: Send + Sync {
    /// Fetches an artifact by id.
    fn get_artifact(&self, id: ArtifactId) -> Result<Artifact>;
    /// Lists every artifact uploaded into `range_id`.
    fn list_artifacts(&self, range_id: RangeId) -> Result<Vec<Artifact>>;
    /// Inserts a new artifact record.
    fn insert_artifact(&self, artifact: Artifact) -> Result<()>;
    /// Looks up an artifact within `range_id` by its exact display name,
    /// the resolution rule `place_file` actions use (§4.6, §9).
    fn find_artifact_by_name(&self, range_id: RangeId, name: &str) -> Result<Option<Artifact>>;
    /// Inserts a new placement record.
    fn insert_placement(&self, placement: ArtifactPlacement) -> Result<()>;
    /// Persists a placement's updated status.
    fn put_placement(&self, placement: &ArtifactPlacement) -> Result<()>;
    /// Lists every placement targeting `vm_id`.
    fn list_placements(&self, vm_id: VmId) -> Result<Vec<ArtifactPlacement>>;
}

/// CRUD surface over principals (§3's `Principal` entity). Identity
/// resolution (tokens, sessions) happens upstream of the core; this is
/// only the durable record of roles, tags, and account standing.
pub trait PrincipalStore: Send + Sync {
    /// Fetches a principal by id.
    fn get_principal(&self, id: PrincipalId) -> Result<Principal>;
    /// Persists a principal's full state.
    fn put_principal(&self, principal: &Principal) -> Result<()>;
    /// Lists every known principal.
    fn list_principals(&self) -> Result<Vec<Principal>>;
}

/// The union of every storage port the core depends on.
///
/// Blanket-implemented for any type implementing all five parts, so
/// `cyroid-sdk`'s in-memory reference store (or a future persistent one)
/// needs only to implement the individual traits to satisfy this one.
pub trait Repository:
    TopologyStore + MselStore + JournalStore + ArtifactStore + PrincipalStore + Send + Sync
{
}

impl<T> Repository for T where
    T: TopologyStore + MselStore + JournalStore + ArtifactStore + PrincipalStore + Send + Sync
{
}
