//! The storage port C4's plans and C5's synthesizer read and write
//! through (§9's "store ids, resolve through the repository" guidance).
//!
//! `cyroid-sdk`'s in-memory repository implements this trait; keeping it
//! local to this crate (rather than depending on `cyroid-sdk`) avoids a
//! dependency cycle, since the facade crate composes every domain crate.

use cyroid_common::error::Result;
use cyroid_common::ids::{NetworkId, RangeId, SnapshotId, TemplateId, VmId};

use crate::model::{Network, Range, Snapshot, Vm, VmTemplate};

/// CRUD surface over ranges, networks, VMs, templates, and snapshots.
///
/// Calls are synchronous (§5: "repository calls assumed synchronous,
/// bounded by the underlying store") even though plan execution itself is
/// `async` to interleave with C1 calls.
pub trait TopologyStore: Send + Sync {
    /// Fetches a range by id.
    fn get_range(&self, id: RangeId) -> Result<Range>;
    /// Lists every range, in a stable order. Used by the Authorization
    /// Filter (C3)'s list endpoints, which filter the full set down to
    /// what a given principal may see.
    fn list_ranges(&self) -> Result<Vec<Range>>;
    /// Persists a range's full state.
    fn put_range(&self, range: &Range) -> Result<()>;
    /// Lists every network belonging to `range_id`, in a stable order.
    fn list_networks(&self, range_id: RangeId) -> Result<Vec<Network>>;
    /// Persists a network's full state.
    fn put_network(&self, network: &Network) -> Result<()>;
    /// Lists every VM belonging to `range_id`, in a stable order.
    fn list_vms(&self, range_id: RangeId) -> Result<Vec<Vm>>;
    /// Fetches a single VM by id.
    fn get_vm(&self, id: VmId) -> Result<Vm>;
    /// Persists a VM's full state.
    fn put_vm(&self, vm: &Vm) -> Result<()>;
    /// Fetches a single network by id.
    fn get_network(&self, id: NetworkId) -> Result<Network>;
    /// Fetches a template by id.
    fn get_template(&self, id: TemplateId) -> Result<VmTemplate>;
    /// Inserts a new range, generating no id (the caller supplies one).
    fn insert_range(&self, range: Range) -> Result<()>;
    /// Inserts a new network.
    fn insert_network(&self, network: Network) -> Result<()>;
    /// Inserts a new VM.
    fn insert_vm(&self, vm: Vm) -> Result<()>;
    /// Inserts a new snapshot record.
    fn insert_snapshot(&self, snapshot: Snapshot) -> Result<()>;
    /// Fetches a snapshot by id.
    fn get_snapshot(&self, id: SnapshotId) -> Result<Snapshot>;
    /// Looks up a template id by its display name, used by blueprint
    /// import (§4.4's "range export/import").
    fn find_template_by_name(&self, name: &str) -> Result<Option<TemplateId>>;
}
