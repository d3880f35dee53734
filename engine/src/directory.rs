//! Vendor directory abstraction.
//!
//! Vendor accounts (billing mode, payout method, minimum payout) are owned
//! by the wider platform; the engine only reads them. The in-memory
//! implementation backs demos and tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::types::{VendorAccount, VendorId};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Read access to vendor accounts
#[async_trait]
pub trait VendorDirectory: Send + Sync {
    /// Fetches a vendor account, `None` if the vendor is unknown
    async fn vendor(&self, vendor_id: VendorId) -> Result<Option<VendorAccount>, StoreError>;
}

/// In-memory vendor directory for demos and tests
#[derive(Clone, Default)]
pub struct InMemoryVendorDirectory {
    accounts: Arc<RwLock<HashMap<VendorId, VendorAccount>>>,
}

impl InMemoryVendorDirectory {
    /// Creates an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a vendor account
    pub async fn upsert(&self, account: VendorAccount) {
        self.accounts.write().await.insert(account.vendor_id, account);
    }
}

#[async_trait]
impl VendorDirectory for InMemoryVendorDirectory {
    async fn vendor(&self, vendor_id: VendorId) -> Result<Option<VendorAccount>, StoreError> {
        Ok(self.accounts.read().await.get(&vendor_id).cloned())
    }
}
