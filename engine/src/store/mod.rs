//! Vendor state persistence.
//!
//! One row per vendor holds the full [`VendorState`] snapshot plus a
//! version stamp. Saves are compare-and-swap on that stamp: a save built on
//! a stale load fails with [`StoreError::VersionConflict`] and the caller
//! reloads and retries. That is the whole multi-instance concurrency story;
//! there are no in-process locks to rely on.

pub mod memory;
pub mod postgres;

use crate::error::StoreError;
use crate::types::{VendorId, VendorState};
use async_trait::async_trait;
use payouts_core::version::Version;

pub use memory::InMemoryVendorStore;
pub use postgres::PostgresVendorStore;

/// Persistent store for per-vendor engine state
#[async_trait]
pub trait VendorStore: Send + Sync {
    /// Loads a vendor's state; `None` if the vendor was never persisted
    async fn load(&self, vendor_id: VendorId) -> Result<Option<VendorState>, StoreError>;

    /// Saves a vendor's state.
    ///
    /// The expected version is taken from `state.version()`: `None` inserts
    /// a fresh row, `Some` compare-and-swaps against the stored stamp.
    /// Returns the new version on success.
    async fn save(&self, state: &VendorState) -> Result<Version, StoreError>;
}
