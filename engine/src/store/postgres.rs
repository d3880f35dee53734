//! Postgres-backed vendor store.
//!
//! One JSONB snapshot row per vendor with a `version` column for the
//! compare-and-swap. Two side tables mirror the idempotency sets with real
//! uniqueness constraints, so a duplicate recognition or refund event is
//! refused by the database even if two engine instances race past the
//! in-state check.

use crate::config::PostgresConfig;
use crate::error::StoreError;
use crate::store::VendorStore;
use crate::types::{VendorId, VendorState};
use async_trait::async_trait;
use payouts_core::version::Version;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Postgres vendor store
#[derive(Clone)]
pub struct PostgresVendorStore {
    pool: PgPool,
}

impl PostgresVendorStore {
    /// Creates a store over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool from configuration
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pool cannot be established.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Creates the schema if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on DDL failure.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS vendor_states (
                vendor_id UUID PRIMARY KEY,
                state JSONB NOT NULL,
                version BIGINT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS recognized_line_items (
                order_id UUID NOT NULL,
                line_index INTEGER NOT NULL,
                vendor_id UUID NOT NULL,
                PRIMARY KEY (order_id, line_index)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS refund_events (
                refund_event_id UUID PRIMARY KEY,
                vendor_id UUID NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl VendorStore for PostgresVendorStore {
    async fn load(&self, vendor_id: VendorId) -> Result<Option<VendorState>, StoreError> {
        let row: Option<(serde_json::Value, i64)> =
            sqlx::query_as("SELECT state, version FROM vendor_states WHERE vendor_id = $1")
                .bind(vendor_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            None => Ok(None),
            Some((value, version)) => {
                let mut state: VendorState = serde_json::from_value(value)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                let version = u64::try_from(version)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                state.set_version(Version::new(version));
                Ok(Some(state))
            }
        }
    }

    async fn save(&self, state: &VendorState) -> Result<Version, StoreError> {
        let snapshot = serde_json::to_value(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let new_version = match state.version() {
            None => {
                let inserted = sqlx::query(
                    "INSERT INTO vendor_states (vendor_id, state, version) VALUES ($1, $2, $3)
                     ON CONFLICT (vendor_id) DO NOTHING",
                )
                .bind(state.vendor_id.as_uuid())
                .bind(&snapshot)
                .bind(version_as_i64(Version::initial())?)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

                if inserted.rows_affected() != 1 {
                    return Err(StoreError::VersionConflict {
                        vendor_id: state.vendor_id,
                    });
                }
                Version::initial()
            }
            Some(expected) => {
                let next = expected.next();
                let updated = sqlx::query(
                    "UPDATE vendor_states SET state = $2, version = $3
                     WHERE vendor_id = $1 AND version = $4",
                )
                .bind(state.vendor_id.as_uuid())
                .bind(&snapshot)
                .bind(version_as_i64(next)?)
                .bind(version_as_i64(expected)?)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

                if updated.rows_affected() != 1 {
                    return Err(StoreError::VersionConflict {
                        vendor_id: state.vendor_id,
                    });
                }
                next
            }
        };

        // Mirror the idempotency sets into the unique side tables. A row
        // that already exists must belong to this vendor; a key claimed by
        // another vendor aborts the save before the commit.
        for txn in &state.commissions.transactions {
            let inserted = sqlx::query(
                "INSERT INTO recognized_line_items (order_id, line_index, vendor_id)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (order_id, line_index) DO NOTHING",
            )
            .bind(txn.key.order_id.as_uuid())
            .bind(i64::from(txn.key.line_index))
            .bind(txn.vendor_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            if inserted.rows_affected() == 0 {
                let (owner,): (uuid::Uuid,) = sqlx::query_as(
                    "SELECT vendor_id FROM recognized_line_items
                     WHERE order_id = $1 AND line_index = $2",
                )
                .bind(txn.key.order_id.as_uuid())
                .bind(i64::from(txn.key.line_index))
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

                if owner != *txn.vendor_id.as_uuid() {
                    return Err(StoreError::KeyConflict {
                        key: txn.key.to_string(),
                        owner: VendorId::from_uuid(owner),
                    });
                }
            }
        }

        for refund_event_id in &state.commissions.refund_events {
            let inserted = sqlx::query(
                "INSERT INTO refund_events (refund_event_id, vendor_id)
                 VALUES ($1, $2)
                 ON CONFLICT (refund_event_id) DO NOTHING",
            )
            .bind(refund_event_id.as_uuid())
            .bind(state.vendor_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            if inserted.rows_affected() == 0 {
                let (owner,): (uuid::Uuid,) = sqlx::query_as(
                    "SELECT vendor_id FROM refund_events WHERE refund_event_id = $1",
                )
                .bind(refund_event_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

                if owner != *state.vendor_id.as_uuid() {
                    return Err(StoreError::KeyConflict {
                        key: refund_event_id.to_string(),
                        owner: VendorId::from_uuid(owner),
                    });
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(new_version)
    }
}

fn version_as_i64(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.value()).map_err(|e| StoreError::Serialization(e.to_string()))
}
