//! Payout gateway abstraction.
//!
//! The engine never talks to a payment rail directly; it hands a transfer
//! instruction to a [`PayoutGateway`] and reacts to the outcome. The mock
//! implementation stands in for the real rail in demos and tests.

use std::future::Future;
use std::pin::Pin;

use crate::error::GatewayError;
use crate::types::{Currency, Money, PayoutMethod, PayoutRequestId, VendorId};
use uuid::Uuid;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Everything the rail needs to move the money
#[derive(Clone, Debug)]
pub struct TransferInstruction {
    /// Payout request being fulfilled
    pub request_id: PayoutRequestId,
    /// Vendor being paid
    pub vendor_id: VendorId,
    /// Amount to transfer
    pub amount: Money,
    /// Transfer currency
    pub currency: Currency,
    /// Delivery method
    pub method: PayoutMethod,
}

/// Gateway acknowledgement of an accepted transfer
#[derive(Clone, Debug)]
pub struct TransferReceipt {
    /// Rail-side reference for reconciliation
    pub gateway_ref: String,
}

/// External payment rail the engine dispatches payouts through.
///
/// Acceptance is not completion: a successful dispatch only means the rail
/// took custody of the instruction. The final outcome arrives later through
/// the confirmation path.
pub trait PayoutGateway: Send + Sync {
    /// Dispatches a transfer to the rail
    fn dispatch_transfer(
        &self,
        instruction: TransferInstruction,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<TransferReceipt>> + Send + '_>>;
}

/// Mock gateway for demos and tests.
#[derive(Clone, Debug, Default)]
pub struct MockPayoutGateway {
    fail_with: Option<String>,
}

impl MockPayoutGateway {
    /// Creates a mock that accepts every transfer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that rejects every transfer with `reason`
    #[must_use]
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
        }
    }
}

impl PayoutGateway for MockPayoutGateway {
    fn dispatch_transfer(
        &self,
        instruction: TransferInstruction,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<TransferReceipt>> + Send + '_>> {
        let fail_with = self.fail_with.clone();
        Box::pin(async move {
            if let Some(reason) = fail_with {
                tracing::warn!(
                    request_id = %instruction.request_id,
                    vendor_id = %instruction.vendor_id,
                    %reason,
                    "Mock gateway rejecting transfer"
                );
                return Err(GatewayError::Rejected { reason });
            }

            let gateway_ref = format!("mock-{}", Uuid::new_v4());
            tracing::info!(
                request_id = %instruction.request_id,
                vendor_id = %instruction.vendor_id,
                amount = %instruction.amount,
                currency = %instruction.currency,
                %gateway_ref,
                "Mock gateway accepted transfer"
            );
            Ok(TransferReceipt { gateway_ref })
        })
    }
}
