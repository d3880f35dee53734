//! Vendor earnings and payout reconciliation engine for a multi-tenant
//! event marketplace.
//!
//! Settled order lines flow in, get split into platform commission and
//! vendor share with exact integer arithmetic, and accrue on a per-vendor
//! earnings ledger. Refunds reverse earnings proportionally (clawing back
//! what was already paid out), vendors withdraw through a payout request
//! state machine, and subscription-mode vendors carry a recurring-fee
//! ledger instead of per-sale commission.
//!
//! # Architecture
//!
//! Each vendor's state is four pure reducers behind one service facade:
//!
//! - [`aggregates::commission`] — recognition and refund adjustments
//! - [`aggregates::earnings`] — the balance ledger and its invariant
//! - [`aggregates::payout`] — the payout request state machine
//! - [`aggregates::subscription`] — recurring-fee billing cycles
//!
//! [`app::EarningsEngine`] drives them: load state, reduce, save with a
//! compare-and-swap on the version stamp, retry on conflict. Reducers
//! never perform IO; the payout reducer describes its gateway dispatch as
//! an effect the service layer executes.
//!
//! # Example
//!
//! ```ignore
//! use payouts_engine::{app::EarningsEngine, store::InMemoryVendorStore};
//!
//! let engine = EarningsEngine::new(store, directory, gateway, clock, config);
//! let txn = engine.recognize_line_item(settled_item).await?;
//! ```

pub mod aggregates;
pub mod app;
pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod store;
pub mod types;
pub mod views;

pub use app::{EarningsEngine, PayoutOutcome};
pub use config::{Config, EngineConfig};
pub use error::{EngineError, GatewayError, Rejection, StoreError};
