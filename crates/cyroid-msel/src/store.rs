//! Storage port for MSELs and their injects, and the import contract
//! that replaces a range's MSEL atomically (§4.6).

use cyroid_common::error::Result;
use cyroid_common::ids::{InjectId, MselId, RangeId};

use crate::ast::{Inject, Msel};

/// CRUD surface over MSELs and injects, consumed by
/// [`import_msel`]/execution call sites.
pub trait MselStore: Send + Sync {
    /// Fetches the single MSEL owned by `range_id`, if any (§3: "at most
    /// one per range").
    fn get_msel_for_range(&self, range_id: RangeId) -> Result<Option<Msel>>;
    /// Persists a new MSEL (and its injects) wholesale.
    fn put_msel(&self, msel: &Msel) -> Result<()>;
    /// Deletes an MSEL, cascading its injects.
    fn delete_msel(&self, msel_id: MselId) -> Result<()>;
    /// Fetches a single inject by id.
    fn get_inject(&self, inject_id: InjectId) -> Result<Inject>;
    /// Persists a single inject's updated state (status, execution log).
    fn put_inject(&self, inject: &Inject) -> Result<()>;
}

/// Imports `msel` into `range_id`, replacing any prior MSEL for that
/// range atomically: the old MSEL (and its injects, cascading) is
/// deleted first, then the new one is inserted (§4.6's importer
/// contract).
///
/// # Errors
/// Propagates any storage error from the delete or insert step.
pub fn import_msel(store: &dyn MselStore, range_id: RangeId, msel: Msel) -> Result<MselId> {
    if let Some(existing) = store.get_msel_for_range(range_id)? {
        store.delete_msel(existing.id)?;
    }
    let id = msel.id;
    store.put_msel(&msel)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MemoryMselStore {
        msels: Mutex<Vec<Msel>>,
    }

    impl MselStore for MemoryMselStore {
        fn get_msel_for_range(&self, range_id: RangeId) -> Result<Option<Msel>> {
            Ok(self.msels.lock().unwrap().iter().find(|m| m.range_id == range_id).cloned())
        }
        fn put_msel(&self, msel: &Msel) -> Result<()> {
            self.msels.lock().unwrap().push(msel.clone());
            Ok(())
        }
        fn delete_msel(&self, msel_id: MselId) -> Result<()> {
            self.msels.lock().unwrap().retain(|m| m.id != msel_id);
            Ok(())
        }
        fn get_inject(&self, inject_id: InjectId) -> Result<Inject> {
            self.msels
                .lock()
                .unwrap()
                .iter()
                .flat_map(|m| m.injects.iter())
                .find(|i| i.id == inject_id)
                .cloned()
                .ok_or_else(|| cyroid_common::error::CyroidError::not_found("inject", inject_id.to_string()))
        }
        fn put_inject(&self, inject: &Inject) -> Result<()> {
            for msel in self.msels.lock().unwrap().iter_mut() {
                if let Some(existing) = msel.injects.iter_mut().find(|i| i.id == inject.id) {
                    *existing = inject.clone();
                    return Ok(());
                }
            }
            Ok(())
        }
    }

    #[test]
    fn importing_replaces_prior_msel_for_same_range() {
        let store = MemoryMselStore { msels: Mutex::new(Vec::new()) };
        let range_id = RangeId::new();

        let first = crate::parser::parse(range_id, "v1", "## T+0:00 - A\n");
        let first_id = import_msel(&store, range_id, first).unwrap();
        assert_eq!(store.msels.lock().unwrap().len(), 1);

        let second = crate::parser::parse(range_id, "v2", "## T+0:00 - B\n## T+1:00 - C\n");
        let second_id = import_msel(&store, range_id, second).unwrap();

        let remaining = store.msels.lock().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second_id);
        assert_ne!(first_id, second_id);
        assert_eq!(remaining[0].injects.len(), 2);
    }
}
