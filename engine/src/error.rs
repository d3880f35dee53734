//! Error taxonomy for the payout engine.
//!
//! Reducers never return `Result`; they record a typed [`Rejection`] on
//! their state and the service layer converts it into an [`EngineError`]
//! for the caller. Idempotency hits ([`Rejection::DuplicateRecognition`],
//! [`Rejection::DuplicateRefund`]) are not failures: the service layer
//! reports them as successful no-ops carrying the existing record.

use crate::types::{LineItemKey, Money, PayoutRequestId, PayoutStatus, RefundEventId, VendorId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a reducer refused a command.
///
/// Serialized with the aggregate state so a rejection recorded just before
/// a crash is still visible after recovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// The line item was already recognized (idempotency hit, not a failure)
    DuplicateRecognition {
        /// Recognition identity that matched
        key: LineItemKey,
    },
    /// The refund event was already applied (idempotency hit, not a failure)
    DuplicateRefund {
        /// Refund event that matched
        refund_event_id: RefundEventId,
    },
    /// No recognition exists for the referenced line item
    UnknownLineItem {
        /// The missing identity
        key: LineItemKey,
    },
    /// Refund amount exceeds the refundable remainder of the line item
    InvalidRefund {
        /// Requested gross refund
        requested: Money,
        /// Gross amount still refundable
        refundable: Money,
    },
    /// Requested or reserved amount exceeds the available balance
    InsufficientBalance {
        /// Amount asked for
        requested: Money,
        /// Pending balance at the time
        available: Money,
    },
    /// Full-balance payout requested below the vendor's minimum
    BelowMinimum {
        /// Pending balance at the time
        available: Money,
        /// Minimum payout threshold
        minimum: Money,
    },
    /// Amount failed basic validation (zero, or exceeding a bound)
    InvalidAmount {
        /// Human-readable reason
        reason: String,
    },
    /// The payout state machine refused the transition
    InvalidStateTransition {
        /// State the request is in
        from: PayoutStatus,
        /// State the command asked for
        to: PayoutStatus,
    },
    /// No payout request with this id exists for the vendor
    RequestNotFound {
        /// The missing request
        request_id: PayoutRequestId,
    },
    /// A billing period failed validation
    InvalidPeriod {
        /// Human-readable reason
        reason: String,
    },
    /// The vendor's ledger is frozen after an invariant violation; no
    /// mutation is allowed until operators intervene
    LedgerFrozen,
    /// The accounting identity broke after a mutation
    InvariantViolated {
        /// Snapshot of the inconsistent balances
        details: String,
    },
}

/// Errors surfaced by [`crate::app::EarningsEngine`] operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Vendor billing configuration is missing or invalid; the operation is
    /// left un-applied to be retried after the configuration is fixed
    #[error("configuration error for vendor {vendor_id}: {reason}")]
    Configuration {
        /// Vendor with the broken configuration
        vendor_id: VendorId,
        /// What is missing or invalid
        reason: String,
    },

    /// No vendor account exists for this id
    #[error("vendor {0} not found")]
    VendorNotFound(VendorId),

    /// No payout request with this id exists for the vendor
    #[error("payout request {0} not found")]
    RequestNotFound(PayoutRequestId),

    /// Refund amount exceeds the refundable remainder
    #[error("invalid refund: requested {requested}, refundable {refundable}")]
    InvalidRefund {
        /// Requested gross refund
        requested: Money,
        /// Gross amount still refundable
        refundable: Money,
    },

    /// Payout request or approval exceeds available funds
    #[error("insufficient balance: {reason}")]
    InsufficientBalance {
        /// Specific rejection reason shown to the vendor
        reason: String,
    },

    /// Payout state machine guard violation
    #[error("invalid payout transition: {from} -> {to}")]
    InvalidStateTransition {
        /// State the request is in
        from: PayoutStatus,
        /// State the command asked for
        to: PayoutStatus,
    },

    /// Command failed basic validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Fatal internal consistency failure: money is unaccounted for.
    /// Mutation for the vendor halts and the condition is surfaced to the
    /// operational alert channel, never silently recovered.
    #[error("ledger invariant violated for vendor {vendor_id}: {details}")]
    LedgerInvariantViolation {
        /// Affected vendor (now frozen)
        vendor_id: VendorId,
        /// Snapshot of the inconsistent balances
        details: String,
    },

    /// Optimistic-concurrency retries exhausted
    #[error("conflicting concurrent updates for vendor {0}, retries exhausted")]
    Conflict(VendorId),

    /// Storage failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Payment gateway failure
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl EngineError {
    /// Maps a reducer rejection onto the caller-facing taxonomy.
    #[must_use]
    pub fn from_rejection(vendor_id: VendorId, rejection: Rejection) -> Self {
        match rejection {
            Rejection::DuplicateRecognition { key } => {
                // Idempotency hits are handled before this conversion; if one
                // reaches here it is a service-layer bug worth seeing loudly.
                Self::Validation(format!("duplicate recognition for {key}"))
            }
            Rejection::DuplicateRefund { refund_event_id } => {
                Self::Validation(format!("duplicate refund event {refund_event_id}"))
            }
            Rejection::UnknownLineItem { key } => {
                Self::Validation(format!("no recognition for line item {key}"))
            }
            Rejection::InvalidRefund {
                requested,
                refundable,
            } => Self::InvalidRefund {
                requested,
                refundable,
            },
            Rejection::InsufficientBalance {
                requested,
                available,
            } => Self::InsufficientBalance {
                reason: format!("requested {requested} exceeds available {available}"),
            },
            Rejection::BelowMinimum { available, minimum } => Self::InsufficientBalance {
                reason: format!("pending balance {available} is below minimum payout {minimum}"),
            },
            Rejection::InvalidAmount { reason } => Self::Validation(reason),
            Rejection::InvalidStateTransition { from, to } => {
                Self::InvalidStateTransition { from, to }
            }
            Rejection::RequestNotFound { request_id } => Self::RequestNotFound(request_id),
            Rejection::InvalidPeriod { reason } => Self::Validation(reason),
            Rejection::LedgerFrozen => Self::LedgerInvariantViolation {
                vendor_id,
                details: "ledger is frozen after a prior invariant violation".to_string(),
            },
            Rejection::InvariantViolated { details } => {
                Self::LedgerInvariantViolation { vendor_id, details }
            }
        }
    }
}

/// Errors from the vendor state store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The optimistic compare-and-swap lost: the row moved on since load
    #[error("version conflict for vendor {vendor_id}")]
    VersionConflict {
        /// Vendor whose row was concurrently updated
        vendor_id: VendorId,
    },

    /// An idempotency key in the saved state is already claimed by a
    /// different vendor
    #[error("key {key} already claimed by vendor {owner}")]
    KeyConflict {
        /// The contested key
        key: String,
        /// Vendor that owns the existing row
        owner: VendorId,
    },

    /// State could not be serialized or deserialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(String),
}

/// Errors from the payout gateway collaborator.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The gateway rejected the transfer
    #[error("transfer rejected: {reason}")]
    Rejected {
        /// Gateway-provided reason
        reason: String,
    },
    /// The gateway did not answer in time
    #[error("gateway timeout")]
    Timeout,
    /// Any other gateway failure
    #[error("gateway error: {message}")]
    Other {
        /// Error message
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_maps_to_engine_error() {
        let vendor = VendorId::new();
        let err = EngineError::from_rejection(
            vendor,
            Rejection::InsufficientBalance {
                requested: Money::from_major(200),
                available: Money::from_major(150),
            },
        );
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));
        assert!(err.to_string().contains("200.00"));
    }

    #[test]
    fn invariant_violation_names_vendor() {
        let vendor = VendorId::new();
        let err = EngineError::from_rejection(
            vendor,
            Rejection::InvariantViolated {
                details: "balances diverged".to_string(),
            },
        );
        assert!(err.to_string().contains(&vendor.to_string()));
    }
}
