//! Domain types for the vendor earnings & payout engine.
//!
//! All money is carried in integer minor units (cents, fils) and commission
//! rates in basis points, so every split is exact: the platform cut plus the
//! vendor share always reconstructs the original amount to the cent.

use chrono::{DateTime, Utc};
use payouts_core::version::Version;
use payouts_macros::State;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::aggregates::commission::CommissionState;
use crate::aggregates::earnings::LedgerState;
use crate::aggregates::payout::PayoutState;
use crate::aggregates::subscription::SubscriptionState;

/// Unique identifier for a vendor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorId(Uuid);

impl VendorId {
    /// Creates a new random `VendorId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `VendorId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VendorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random `OrderId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an `OrderId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a payout request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayoutRequestId(Uuid);

impl PayoutRequestId {
    /// Creates a new random `PayoutRequestId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `PayoutRequestId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PayoutRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PayoutRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a gateway-confirmed refund event.
///
/// Refund webhooks are delivered at-least-once; this id is the idempotency
/// key that keeps a redelivered refund from double-reversing earnings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefundEventId(Uuid);

impl RefundEventId {
    /// Creates a new random `RefundEventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `RefundEventId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RefundEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RefundEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money amount in integer minor units (avoids floating point issues)
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a new `Money` amount from minor units (cents, fils)
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates a `Money` amount from major units (dollars, dirhams)
    #[must_use]
    pub const fn from_major(major: u64) -> Self {
        Self(major * 100)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor_units(&self) -> u64 {
        self.0
    }

    /// Checks if this amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, saturating at the numeric bound
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts, saturating at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Subtracts, returning `None` if `other` exceeds `self`
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(minor) => Some(Self(minor)),
            None => None,
        }
    }

    /// Returns the smaller of two amounts
    #[must_use]
    pub const fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Commission rate in basis points (1% = 100 bps).
///
/// Stored integral so commission splits stay exact. Valid rates are
/// `0..=10_000`; the service layer rejects anything else with a
/// configuration error before recognition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// The maximum representable rate: 100%
    pub const MAX_BASIS_POINTS: u32 = 10_000;

    /// Creates a rate from basis points
    #[must_use]
    pub const fn from_basis_points(bps: u32) -> Self {
        Self(bps)
    }

    /// Creates a rate from whole percent
    #[must_use]
    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    /// Returns the rate in basis points
    #[must_use]
    pub const fn basis_points(&self) -> u32 {
        self.0
    }

    /// True if the rate is within `0..=100%`
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 <= Self::MAX_BASIS_POINTS
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// ISO-4217 currency code.
///
/// The engine never converts between currencies; the code only travels
/// through for read contracts and display.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Creates a currency from a code such as `"AED"`
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic rounding rule applied when a split does not land on a
/// whole minor unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Round half away from zero (the marketplace default)
    #[default]
    HalfUp,
    /// Round half to even (banker's rounding)
    HalfEven,
}

impl std::str::FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "half_up" | "half-up" | "halfup" => Ok(Self::HalfUp),
            "half_even" | "half-even" | "halfeven" => Ok(Self::HalfEven),
            other => Err(format!("unknown rounding mode: {other}")),
        }
    }
}

/// How a vendor is billed by the platform.
///
/// The two models are mutually exclusive per billing period. This tagged
/// variant is resolved once per recognition from the vendor directory and
/// consumed by the recognition dispatch, never re-checked ad hoc.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMode {
    /// Per-transaction commission: the platform takes `rate` of every sale
    Commission {
        /// Commission rate; `None` falls back to the configured platform
        /// default, and a missing default blocks recognition
        rate: Option<CommissionRate>,
    },
    /// Flat recurring subscription: the vendor keeps the full sale amount
    /// and pays `fee` per billing cycle, collected separately
    Subscription {
        /// Recurring fee per billing cycle
        fee: Money,
        /// Currency the fee is billed in
        currency: Currency,
    },
}

/// How payouts are delivered to a vendor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutMethod {
    /// Bank transfer to the vendor's registered account
    BankTransfer {
        /// Last four digits of the account, for display
        account_last_four: String,
    },
    /// `PayPal` transfer
    PayPal {
        /// Destination email
        email: String,
    },
    /// Credit to the vendor's platform wallet
    PlatformWallet,
}

/// A vendor account as read from the platform's vendor store.
///
/// Owned by the platform; the engine reads it and never mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAccount {
    /// Vendor identifier
    pub vendor_id: VendorId,
    /// Display name, for logs and dashboards
    pub display_name: String,
    /// Billing model; `None` means the vendor is not configured for
    /// settlement yet and recognition must fail, not default
    pub mode: Option<PaymentMode>,
    /// Minimum payout this vendor may request; `None` uses the platform
    /// default
    pub minimum_payout: Option<Money>,
    /// Preferred payout delivery method
    pub payout_method: PayoutMethod,
    /// Currency the vendor settles in
    pub currency: Currency,
}

/// Identity of one settled order line: the recognition idempotency key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemKey {
    /// Order the line belongs to
    pub order_id: OrderId,
    /// Zero-based index of the line within the order
    pub line_index: u32,
}

impl LineItemKey {
    /// Creates a key
    #[must_use]
    pub const fn new(order_id: OrderId, line_index: u32) -> Self {
        Self {
            order_id,
            line_index,
        }
    }
}

impl fmt::Display for LineItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.order_id, self.line_index)
    }
}

/// Immutable fact derived from a paid order: one settled line item,
/// eligible for earnings recognition. Produced once by the settlement
/// pipeline and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledLineItem {
    /// Recognition identity
    pub key: LineItemKey,
    /// Vendor the sale is attributed to
    pub vendor_id: VendorId,
    /// Gross sale amount of the line
    pub original_amount: Money,
    /// Sale currency
    pub currency: Currency,
    /// When the payment settled
    pub settled_at: DateTime<Utc>,
}

/// Status of a commission transaction. `Paid` is terminal; refunds create
/// negative adjustments, never a status rollback. `Approved` falls back to
/// `Pending` only when the covering payout fails before settling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommissionStatus {
    /// Recognized, not yet covered by an approved payout
    Pending,
    /// Covered by an approved payout awaiting gateway confirmation
    Approved,
    /// Included in a completed payout
    Paid,
}

/// Derived record of how one settled line item was split between platform
/// and vendor. Created exactly once per line item; under subscription mode
/// the platform commission is zero but the record still anchors idempotent
/// refund tracking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionTransaction {
    /// The settled line item this derives from
    pub key: LineItemKey,
    /// Vendor the earnings accrue to
    pub vendor_id: VendorId,
    /// Gross amount of the line item
    pub original_amount: Money,
    /// Platform cut
    pub platform_commission: Money,
    /// Vendor share (`original_amount - platform_commission`)
    pub vendor_commission: Money,
    /// Sale currency
    pub currency: Currency,
    /// Lifecycle status
    pub status: CommissionStatus,
    /// Cumulative gross amount refunded against this line item
    pub refunded_amount: Money,
    /// Cumulative vendor-side reduction applied for refunds
    pub vendor_reduced: Money,
    /// When the split was computed
    pub calculated_at: DateTime<Utc>,
}

impl CommissionTransaction {
    /// Gross amount still refundable against this line item
    #[must_use]
    pub const fn refundable_remainder(&self) -> Money {
        self.original_amount.saturating_sub(self.refunded_amount)
    }
}

/// Status of a payout request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Requested by the vendor, no funds moved
    Pending,
    /// Approved; funds reserved, gateway handoff imminent
    Approved,
    /// Dispatched to the payment gateway
    Processing,
    /// Gateway confirmed the transfer (terminal)
    Completed,
    /// Gateway or dispatch failure; reservation released (terminal)
    Failed,
    /// Cancelled while still pending (terminal)
    Cancelled,
}

impl PayoutStatus {
    /// True for states that never transition further
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A vendor-initiated request to withdraw pending earnings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Request identifier
    pub id: PayoutRequestId,
    /// Requesting vendor
    pub vendor_id: VendorId,
    /// Explicit amount requested; `None` means "full balance at approval
    /// time"
    pub amount: Option<Money>,
    /// Amount pinned at approval (what was actually reserved)
    pub approved_amount: Option<Money>,
    /// Lifecycle status
    pub status: PayoutStatus,
    /// Delivery method
    pub method: PayoutMethod,
    /// When the vendor requested the payout
    pub requested_at: DateTime<Utc>,
    /// When a terminal state was reached
    pub resolved_at: Option<DateTime<Utc>>,
    /// Gateway transfer reference, once dispatched
    pub gateway_ref: Option<String>,
    /// Failure reason, if the request failed
    pub failure_reason: Option<String>,
    /// Line items whose vendor share this payout covers, fixed at approval
    #[serde(default)]
    pub covered_items: Vec<LineItemKey>,
}

/// Status of one subscription billing-cycle payment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionPaymentStatus {
    /// Charge settled
    Paid,
    /// Charge attempted and failed
    Failed,
    /// Charge initiated, outcome unknown
    PendingCharge,
}

/// One subscription billing-cycle payment record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPaymentRecord {
    /// Billing period start (inclusive)
    pub period_start: DateTime<Utc>,
    /// Billing period end (exclusive); a paid record advances `paid_until`
    /// to this instant
    pub period_end: DateTime<Utc>,
    /// Fee amount for the cycle
    pub amount: Money,
    /// Charge outcome
    pub status: SubscriptionPaymentStatus,
    /// When the charge was recorded
    pub paid_at: DateTime<Utc>,
}

/// Derived subscription standing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    /// Paid up
    Active,
    /// Past due, within the grace window
    GracePeriod,
    /// Past due beyond the grace window
    Expired,
    /// Forced inactive by an admin or gateway failure signal
    Suspended,
}

/// Per-vendor running balances: the single source of truth for vendor-owed
/// money.
///
/// Invariant after every mutation:
/// `total_earned + clawback_owed == total_paid_out + in_processing + pending_balance`.
/// Negative balances are impossible by construction: reversals that exceed
/// the pending balance become `clawback_owed` instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsLedger {
    /// Lifetime recognized earnings, net of refund reversals
    pub total_earned: Money,
    /// Available to request payout
    pub pending_balance: Money,
    /// Committed to an approved-but-unconfirmed payout
    pub in_processing: Money,
    /// Lifetime confirmed payouts
    pub total_paid_out: Money,
    /// Receivable owed by the vendor: refunds that landed after the funds
    /// were already paid out. Netted against future recognitions.
    pub clawback_owed: Money,
    /// Set when an invariant violation was detected; all further mutation
    /// for this vendor is refused until operators intervene
    pub frozen: bool,
}

impl EarningsLedger {
    /// Checks the accounting identity
    #[must_use]
    pub const fn invariant_holds(&self) -> bool {
        self.total_earned.minor_units() + self.clawback_owed.minor_units()
            == self.total_paid_out.minor_units()
                + self.in_processing.minor_units()
                + self.pending_balance.minor_units()
    }
}

/// The full persisted state for one vendor: the four aggregate sub-states
/// plus the optimistic-concurrency version stamp.
///
/// This is the unit of atomicity. Every engine operation loads one vendor's
/// state, reduces it, and saves it back with a compare-and-swap on
/// `version`; concurrent webhooks for the same vendor serialize through the
/// retry loop while different vendors proceed in parallel.
#[derive(State, Clone, Debug, Serialize, Deserialize)]
pub struct VendorState {
    /// Vendor this state belongs to
    pub vendor_id: VendorId,
    /// Recognition and refund-adjustment records
    pub commissions: CommissionState,
    /// Running balances
    pub ledger: LedgerState,
    /// Payout request lifecycle
    pub payouts: PayoutState,
    /// Recurring-fee standing
    pub subscription: SubscriptionState,
    /// Persisted version; `None` until first saved
    #[version]
    pub version: Option<Version>,
}

impl VendorState {
    /// Creates the empty state for a vendor that has never been persisted
    #[must_use]
    pub fn new(vendor_id: VendorId) -> Self {
        Self {
            vendor_id,
            commissions: CommissionState::default(),
            ledger: LedgerState::default(),
            payouts: PayoutState::default(),
            subscription: SubscriptionState::default(),
            version: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display() {
        assert_eq!(Money::from_minor(100).to_string(), "1.00");
        assert_eq!(Money::from_minor(1050).to_string(), "10.50");
        assert_eq!(Money::from_major(42).to_string(), "42.00");
    }

    #[test]
    fn money_saturating_sub_floors_at_zero() {
        let a = Money::from_minor(50);
        let b = Money::from_minor(80);
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a), Money::from_minor(30));
        assert_eq!(a.checked_sub(b), None);
    }

    #[test]
    fn commission_rate_display_and_validity() {
        assert_eq!(CommissionRate::from_percent(10).to_string(), "10.00%");
        assert_eq!(CommissionRate::from_basis_points(1250).to_string(), "12.50%");
        assert!(CommissionRate::from_basis_points(10_000).is_valid());
        assert!(!CommissionRate::from_basis_points(10_001).is_valid());
    }

    #[test]
    fn rounding_mode_parses() {
        assert_eq!("half_up".parse::<RoundingMode>(), Ok(RoundingMode::HalfUp));
        assert_eq!(
            "half-even".parse::<RoundingMode>(),
            Ok(RoundingMode::HalfEven)
        );
        assert!("nearest".parse::<RoundingMode>().is_err());
    }

    #[test]
    fn payout_status_terminality() {
        assert!(PayoutStatus::Completed.is_terminal());
        assert!(PayoutStatus::Failed.is_terminal());
        assert!(PayoutStatus::Cancelled.is_terminal());
        assert!(!PayoutStatus::Processing.is_terminal());
    }

    #[test]
    fn ledger_invariant_on_default() {
        let ledger = EarningsLedger::default();
        assert!(ledger.invariant_holds());
    }

    #[test]
    fn line_item_key_display() {
        let key = LineItemKey::new(OrderId::new(), 2);
        assert!(key.to_string().ends_with("#2"));
    }

    #[test]
    fn vendor_state_version_accessors() {
        let mut state = VendorState::new(VendorId::new());
        assert!(state.version().is_none());
        state.set_version(Version::initial());
        assert_eq!(state.version(), Some(Version::initial()));
    }
}
