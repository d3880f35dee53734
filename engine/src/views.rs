//! Read projections over vendor state.
//!
//! All views are pure functions of a loaded [`VendorState`]; nothing here
//! mutates or persists. Derived fields (subscription standing) are computed
//! at read time so they can never go stale.

use crate::types::{
    CommissionTransaction, Currency, EarningsLedger, Money, PayoutRequest, PayoutStatus,
    SubscriptionPaymentRecord, SubscriptionStatus, VendorId, VendorState,
};
use payouts_core::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dashboard summary of one vendor's earnings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    /// Vendor the summary belongs to
    pub vendor_id: VendorId,
    /// Running balances
    pub ledger: EarningsLedger,
    /// Count of recognized line items
    pub transaction_count: usize,
    /// Gross amount refunded across all line items
    pub total_refunded: Money,
    /// Currency the vendor settles in
    pub currency: Currency,
}

impl EarningsSummary {
    /// Projects the summary from vendor state
    #[must_use]
    pub fn project(state: &VendorState, currency: Currency) -> Self {
        let total_refunded = state
            .commissions
            .transactions
            .iter()
            .fold(Money::ZERO, |acc, txn| {
                acc.saturating_add(txn.refunded_amount)
            });
        Self {
            vendor_id: state.vendor_id,
            ledger: state.ledger.ledger.clone(),
            transaction_count: state.commissions.transactions.len(),
            total_refunded,
            currency,
        }
    }
}

/// Totals across a vendor's full commission history, independent of paging
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSummary {
    /// Gross sales recognized
    pub total_sales: Money,
    /// Platform cut across all line items
    pub total_platform_commission: Money,
    /// Vendor share across all line items, before refund reductions
    pub total_vendor_commission: Money,
    /// Gross amount refunded
    pub total_refunded: Money,
}

impl CommissionSummary {
    fn from_transactions(transactions: &[CommissionTransaction]) -> Self {
        transactions.iter().fold(
            Self {
                total_sales: Money::ZERO,
                total_platform_commission: Money::ZERO,
                total_vendor_commission: Money::ZERO,
                total_refunded: Money::ZERO,
            },
            |acc, txn| Self {
                total_sales: acc.total_sales.saturating_add(txn.original_amount),
                total_platform_commission: acc
                    .total_platform_commission
                    .saturating_add(txn.platform_commission),
                total_vendor_commission: acc
                    .total_vendor_commission
                    .saturating_add(txn.vendor_commission),
                total_refunded: acc.total_refunded.saturating_add(txn.refunded_amount),
            },
        )
    }
}

/// One page of commission history, newest first
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommissionHistoryPage {
    /// Totals over the whole history, not just this page
    pub summary: CommissionSummary,
    /// Transactions on this page
    pub transactions: Vec<CommissionTransaction>,
    /// 1-based page number
    pub page: usize,
    /// Page size used
    pub limit: usize,
    /// Total transactions across all pages
    pub total: usize,
}

/// Projects one page of commission history, newest first.
///
/// `page` is 1-based; zero is treated as the first page. A page past the
/// end is empty, not an error.
#[must_use]
pub fn commission_history(state: &VendorState, page: usize, limit: usize) -> CommissionHistoryPage {
    let limit = limit.max(1);
    let page = page.max(1);
    let total = state.commissions.transactions.len();
    let summary = CommissionSummary::from_transactions(&state.commissions.transactions);

    let transactions = state
        .commissions
        .transactions
        .iter()
        .rev()
        .skip((page - 1) * limit)
        .take(limit)
        .cloned()
        .collect();

    CommissionHistoryPage {
        summary,
        transactions,
        page,
        limit,
        total,
    }
}

/// One page of payout history, newest first
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayoutHistoryPage {
    /// Requests on this page
    pub requests: Vec<PayoutRequest>,
    /// 1-based page number
    pub page: usize,
    /// Page size used
    pub limit: usize,
    /// Total requests across all pages
    pub total: usize,
}

/// Projects one page of payout history, newest request first.
#[must_use]
pub fn payout_history(state: &VendorState, page: usize, limit: usize) -> PayoutHistoryPage {
    let limit = limit.max(1);
    let page = page.max(1);

    let mut requests: Vec<PayoutRequest> = state.payouts.requests.values().cloned().collect();
    requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
    let total = requests.len();

    let requests = requests
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .collect();

    PayoutHistoryPage {
        requests,
        page,
        limit,
        total,
    }
}

/// Projects the still-pending payout requests (the approval queue), oldest
/// first.
#[must_use]
pub fn pending_requests(state: &VendorState) -> Vec<PayoutRequest> {
    let mut requests: Vec<PayoutRequest> = state
        .payouts
        .requests
        .values()
        .filter(|request| request.status == PayoutStatus::Pending)
        .cloned()
        .collect();
    requests.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
    requests
}

/// Subscription standing for one vendor at a point in time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionStatusView {
    /// Vendor the view belongs to
    pub vendor_id: VendorId,
    /// Derived standing at the requested instant
    pub status: SubscriptionStatus,
    /// Instant the subscription is paid through
    pub paid_until: Option<DateTime<Utc>>,
    /// Most recently recorded billing-cycle payment
    pub last_payment: Option<SubscriptionPaymentRecord>,
}

/// Projects the subscription standing at `now`.
#[must_use]
pub fn subscription_status(
    state: &VendorState,
    now: DateTime<Utc>,
    grace_period_days: i64,
) -> SubscriptionStatusView {
    SubscriptionStatusView {
        vendor_id: state.vendor_id,
        status: state.subscription.status_at(now, grace_period_days),
        paid_until: state.subscription.paid_until,
        last_payment: state.subscription.payments.last().cloned(),
    }
}
