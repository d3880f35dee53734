//! In-memory vendor store for demos and tests.
//!
//! Honors the same compare-and-swap contract as the Postgres store so the
//! retry loop in the service layer is exercised identically.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::VendorStore;
use crate::types::{VendorId, VendorState};
use async_trait::async_trait;
use payouts_core::version::Version;
use tokio::sync::RwLock;

/// In-memory vendor store
#[derive(Clone, Default)]
pub struct InMemoryVendorStore {
    states: Arc<RwLock<HashMap<VendorId, VendorState>>>,
}

impl InMemoryVendorStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VendorStore for InMemoryVendorStore {
    async fn load(&self, vendor_id: VendorId) -> Result<Option<VendorState>, StoreError> {
        Ok(self.states.read().await.get(&vendor_id).cloned())
    }

    async fn save(&self, state: &VendorState) -> Result<Version, StoreError> {
        let mut states = self.states.write().await;
        let stored_version = states.get(&state.vendor_id).and_then(VendorState::version);

        if stored_version != state.version() {
            return Err(StoreError::VersionConflict {
                vendor_id: state.vendor_id,
            });
        }

        let new_version = state
            .version()
            .map_or_else(Version::initial, |version| version.next());
        let mut to_store = state.clone();
        to_store.set_version(new_version);
        states.insert(state.vendor_id, to_store);
        Ok(new_version)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_save_inserts_at_initial_version() {
        let store = InMemoryVendorStore::new();
        let state = VendorState::new(VendorId::new());

        let version = store.save(&state).await.unwrap();
        assert_eq!(version, Version::initial());

        let loaded = store.load(state.vendor_id).await.unwrap().unwrap();
        assert_eq!(loaded.version(), Some(Version::initial()));
    }

    #[tokio::test]
    async fn stale_save_is_refused() {
        let store = InMemoryVendorStore::new();
        let vendor_id = VendorId::new();
        let state = VendorState::new(vendor_id);

        store.save(&state).await.unwrap();

        // Two copies loaded at the same version
        let mut first = store.load(vendor_id).await.unwrap().unwrap();
        let second = store.load(vendor_id).await.unwrap().unwrap();

        let new_version = store.save(&first).await.unwrap();
        first.set_version(new_version);

        let err = store.save(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn unknown_vendor_loads_none() {
        let store = InMemoryVendorStore::new();
        assert!(store.load(VendorId::new()).await.unwrap().is_none());
    }
}
