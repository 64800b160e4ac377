use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::chains::Blockchain;
use crate::types::SearchOutcome;

/// Latest published search outcome per blockchain, the set a client is
/// currently shown.
pub struct ResultStore {
    latest: DashMap<Blockchain, Arc<SearchOutcome>>,
}

impl ResultStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { latest: DashMap::new() })
    }

    /// Publish an outcome. An older generation never replaces a newer one.
    /// Returns false if the outcome was stale.
    pub fn publish(&self, outcome: SearchOutcome) -> bool {
        match self.latest.entry(outcome.chain) {
            Entry::Occupied(mut current) => {
                if current.get().generation > outcome.generation {
                    return false;
                }
                current.insert(Arc::new(outcome));
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(outcome));
                true
            }
        }
    }

    pub fn latest(&self, chain: Blockchain) -> Option<Arc<SearchOutcome>> {
        self.latest.get(&chain).map(|r| Arc::clone(r.value()))
    }

}
