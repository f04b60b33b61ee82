//! Named, non-reentrant locks hosted by an authority node.

use crate::membership::types::NodeId;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

struct HeldLock {
    holder: NodeId,
    _guard: OwnedMutexGuard<()>,
}

/// Lock table keyed by name. A lock is released by dropping its guard.
#[derive(Default)]
pub struct LockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
    held: DashMap<String, HeldLock>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits, without timeout, until `name` is free and records `holder` as its owner.
    pub async fn acquire(&self, name: &str, holder: &NodeId) {
        let lock = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = lock.lock_owned().await;

        tracing::debug!("Lock '{}' acquired by {:?}", name, holder);
        self.held.insert(
            name.to_string(),
            HeldLock {
                holder: holder.clone(),
                _guard: guard,
            },
        );
    }

    /// Releases `name` if `holder` owns it.
    pub fn release(&self, name: &str, holder: &NodeId) -> bool {
        let released = self
            .held
            .remove_if(name, |_, held| &held.holder == holder)
            .is_some();

        if released {
            tracing::debug!("Lock '{}' released by {:?}", name, holder);
        } else {
            tracing::warn!("{:?} tried to release lock '{}' it does not hold", holder, name);
        }
        released
    }

    /// Releases every lock owned by `holder`. Used when a member departs.
    pub fn release_all(&self, holder: &NodeId) -> usize {
        let names: Vec<String> = self
            .held
            .iter()
            .filter(|entry| &entry.value().holder == holder)
            .map(|entry| entry.key().clone())
            .collect();

        let released = names
            .iter()
            .filter(|name| {
                self.held
                    .remove_if(name.as_str(), |_, held| &held.holder == holder)
                    .is_some()
            })
            .count();

        if released > 0 {
            tracing::info!("Released {} lock(s) held by departed {:?}", released, holder);
        }
        released
    }

    #[cfg(test)]
    pub(crate) fn holder(&self, name: &str) -> Option<NodeId> {
        self.held.get(name).map(|held| held.holder.clone())
    }
}
