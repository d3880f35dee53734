//! Commission aggregate.
//!
//! Turns settled order lines into commission transactions (exactly once per
//! line item) and applies gateway-confirmed refunds as proportional negative
//! adjustments (exactly once per refund event). All split arithmetic is
//! integer basis-point math: the platform cut plus the vendor share always
//! reconstructs the original amount to the minor unit.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Rejection;
use crate::types::{
    CommissionRate, CommissionStatus, CommissionTransaction, LineItemKey, Money, RefundEventId,
    RoundingMode, SettledLineItem,
};
use payouts_core::{effect::Effect, environment::Clock, reducer::Reducer, SmallVec};
use payouts_macros::Action;
use serde::{Deserialize, Serialize};

/// Splits a gross amount into `(platform_commission, vendor_share)`.
///
/// Exactness guarantee: the two parts always sum back to `amount`. The
/// platform cut is rounded per `mode`; the vendor share is the remainder,
/// never computed independently.
#[must_use]
pub fn split_amount(amount: Money, rate: CommissionRate, mode: RoundingMode) -> (Money, Money) {
    let scale = u128::from(CommissionRate::MAX_BASIS_POINTS);
    let product = u128::from(amount.minor_units()) * u128::from(rate.basis_points());
    let quot = product / scale;
    let rem = product % scale;

    let round_up = match mode {
        RoundingMode::HalfUp => rem * 2 >= scale,
        RoundingMode::HalfEven => rem * 2 > scale || (rem * 2 == scale && quot % 2 == 1),
    };
    let platform_minor =
        u64::try_from(quot + u128::from(round_up)).unwrap_or(amount.minor_units());
    let platform = Money::from_minor(platform_minor).min(amount);
    let vendor = amount.saturating_sub(platform);
    (platform, vendor)
}

/// Computes the vendor-side share of a gross refund, proportional to
/// `share / total`, rounded per `mode`.
fn proportional(gross: Money, share: Money, total: Money, mode: RoundingMode) -> Money {
    if total.is_zero() {
        return Money::ZERO;
    }
    let total_minor = u128::from(total.minor_units());
    let product = u128::from(gross.minor_units()) * u128::from(share.minor_units());
    let quot = product / total_minor;
    let rem = product % total_minor;

    let round_up = match mode {
        RoundingMode::HalfUp => rem * 2 >= total_minor,
        RoundingMode::HalfEven => {
            rem * 2 > total_minor || (rem * 2 == total_minor && quot % 2 == 1)
        }
    };
    Money::from_minor(u64::try_from(quot + u128::from(round_up)).unwrap_or(share.minor_units()))
}

/// Recognition and refund-adjustment records for one vendor.
///
/// `transactions` is an append-only journal ordered by recognition time;
/// `refund_events` is the applied-refund idempotency set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionState {
    /// One record per recognized line item, in recognition order
    pub transactions: Vec<CommissionTransaction>,
    /// Refund events already applied
    pub refund_events: HashSet<RefundEventId>,
    /// Why the last command was refused, if it was
    pub last_rejection: Option<Rejection>,
}

impl CommissionState {
    /// Creates an empty commission state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes and clears the recorded rejection
    pub fn take_rejection(&mut self) -> Option<Rejection> {
        self.last_rejection.take()
    }

    /// Looks up the transaction for a line item
    #[must_use]
    pub fn find(&self, key: LineItemKey) -> Option<&CommissionTransaction> {
        self.transactions.iter().find(|txn| txn.key == key)
    }

    fn find_mut(&mut self, key: LineItemKey) -> Option<&mut CommissionTransaction> {
        self.transactions.iter_mut().find(|txn| txn.key == key)
    }
}

/// Environment for the commission reducer
#[derive(Clone)]
pub struct CommissionEnvironment {
    /// Time source for `calculated_at` stamps
    pub clock: Arc<dyn Clock>,
}

/// Actions for the commission aggregate (commands and events)
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum CommissionAction {
    // ========== Commands ==========
    /// Command: recognize a settled line item.
    ///
    /// A zero rate is the subscription-mode path: the record is still
    /// created (it anchors refund idempotency) with a zero platform cut.
    #[command]
    RecognizeLineItem {
        /// The settled line
        item: SettledLineItem,
        /// Effective commission rate for this recognition
        rate: CommissionRate,
        /// Rounding rule for the split
        rounding: RoundingMode,
    },

    /// Command: apply a gateway-confirmed refund against a line item
    #[command]
    RefundLineItem {
        /// Refund idempotency key
        refund_event_id: RefundEventId,
        /// Line item being refunded
        key: LineItemKey,
        /// Gross refund amount
        amount: Money,
        /// Rounding rule for the proportional vendor reduction
        rounding: RoundingMode,
    },

    /// Command: a payout was approved; advance the covered records
    #[command]
    MarkApproved {
        /// Line items the payout covers
        keys: Vec<LineItemKey>,
    },

    /// Command: a payout completed; mark the covered records paid
    #[command]
    MarkPaid {
        /// Line items the payout covered
        keys: Vec<LineItemKey>,
    },

    /// Command: a payout failed; return its covered records to pending
    #[command]
    ReleaseApproval {
        /// Line items the payout had covered
        keys: Vec<LineItemKey>,
    },

    // ========== Events ==========
    /// Event: a line item was recognized and split
    #[event]
    LineItemRecognized {
        /// The derived record
        transaction: CommissionTransaction,
    },

    /// Event: a refund was applied as a negative adjustment
    #[event]
    RefundApplied {
        /// Refund idempotency key
        refund_event_id: RefundEventId,
        /// Line item refunded
        key: LineItemKey,
        /// Gross refund amount
        amount: Money,
        /// Vendor-side reduction
        vendor_reduction: Money,
    },

    /// Event: covered pending records advanced to approved
    #[event]
    Approved {
        /// Line items advanced
        keys: Vec<LineItemKey>,
    },

    /// Event: covered approved records advanced to paid
    #[event]
    Paid {
        /// Line items advanced
        keys: Vec<LineItemKey>,
    },

    /// Event: approved records returned to pending
    #[event]
    ApprovalReleased {
        /// Line items returned
        keys: Vec<LineItemKey>,
    },

    /// Event: a command was refused
    #[event]
    CommandRejected {
        /// Why
        rejection: Rejection,
    },
}

/// Reducer for the commission aggregate
#[derive(Clone, Debug, Default)]
pub struct CommissionReducer;

impl CommissionReducer {
    /// Creates a new `CommissionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn reject(state: &mut CommissionState, rejection: Rejection) {
        Self::apply_event(state, &CommissionAction::CommandRejected { rejection });
    }

    /// Applies an event to state
    fn apply_event(state: &mut CommissionState, action: &CommissionAction) {
        match action {
            CommissionAction::LineItemRecognized { transaction } => {
                state.transactions.push(transaction.clone());
                state.last_rejection = None;
            }
            CommissionAction::RefundApplied {
                refund_event_id,
                key,
                amount,
                vendor_reduction,
            } => {
                state.refund_events.insert(*refund_event_id);
                if let Some(txn) = state.find_mut(*key) {
                    txn.refunded_amount = txn.refunded_amount.saturating_add(*amount);
                    txn.vendor_reduced = txn.vendor_reduced.saturating_add(*vendor_reduction);
                }
                state.last_rejection = None;
            }
            CommissionAction::Approved { keys } => {
                for key in keys {
                    if let Some(txn) = state.find_mut(*key) {
                        if txn.status == CommissionStatus::Pending {
                            txn.status = CommissionStatus::Approved;
                        }
                    }
                }
                state.last_rejection = None;
            }
            CommissionAction::Paid { keys } => {
                for key in keys {
                    if let Some(txn) = state.find_mut(*key) {
                        if txn.status == CommissionStatus::Approved {
                            txn.status = CommissionStatus::Paid;
                        }
                    }
                }
                state.last_rejection = None;
            }
            CommissionAction::ApprovalReleased { keys } => {
                for key in keys {
                    if let Some(txn) = state.find_mut(*key) {
                        if txn.status == CommissionStatus::Approved {
                            txn.status = CommissionStatus::Pending;
                        }
                    }
                }
                state.last_rejection = None;
            }
            CommissionAction::CommandRejected { rejection } => {
                state.last_rejection = Some(rejection.clone());
            }
            // Commands are not applied to state
            CommissionAction::RecognizeLineItem { .. }
            | CommissionAction::RefundLineItem { .. }
            | CommissionAction::MarkApproved { .. }
            | CommissionAction::MarkPaid { .. }
            | CommissionAction::ReleaseApproval { .. } => {}
        }
    }
}

impl Reducer for CommissionReducer {
    type State = CommissionState;
    type Action = CommissionAction;
    type Environment = CommissionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            CommissionAction::RecognizeLineItem {
                item,
                rate,
                rounding,
            } => {
                if state.find(item.key).is_some() {
                    Self::reject(state, Rejection::DuplicateRecognition { key: item.key });
                    return SmallVec::new();
                }
                if !rate.is_valid() {
                    Self::reject(
                        state,
                        Rejection::InvalidAmount {
                            reason: format!("commission rate {rate} exceeds 100%"),
                        },
                    );
                    return SmallVec::new();
                }

                let (platform, vendor) = split_amount(item.original_amount, rate, rounding);
                let transaction = CommissionTransaction {
                    key: item.key,
                    vendor_id: item.vendor_id,
                    original_amount: item.original_amount,
                    platform_commission: platform,
                    vendor_commission: vendor,
                    currency: item.currency,
                    status: CommissionStatus::Pending,
                    refunded_amount: Money::ZERO,
                    vendor_reduced: Money::ZERO,
                    calculated_at: env.clock.now(),
                };
                Self::apply_event(state, &CommissionAction::LineItemRecognized { transaction });
                SmallVec::new()
            }

            CommissionAction::RefundLineItem {
                refund_event_id,
                key,
                amount,
                rounding,
            } => {
                if state.refund_events.contains(&refund_event_id) {
                    Self::reject(state, Rejection::DuplicateRefund { refund_event_id });
                    return SmallVec::new();
                }
                let Some(txn) = state.find(key) else {
                    Self::reject(state, Rejection::UnknownLineItem { key });
                    return SmallVec::new();
                };
                if amount.is_zero() {
                    Self::reject(
                        state,
                        Rejection::InvalidAmount {
                            reason: "refund amount must be greater than zero".to_string(),
                        },
                    );
                    return SmallVec::new();
                }
                let refundable = txn.refundable_remainder();
                if amount > refundable {
                    Self::reject(
                        state,
                        Rejection::InvalidRefund {
                            requested: amount,
                            refundable,
                        },
                    );
                    return SmallVec::new();
                }

                // On a full refund the vendor reduction is forced exact so
                // cumulative rounding can never strand a residual cent.
                let vendor_reduction = if amount == refundable {
                    txn.vendor_commission.saturating_sub(txn.vendor_reduced)
                } else {
                    proportional(amount, txn.vendor_commission, txn.original_amount, rounding)
                        .min(txn.vendor_commission.saturating_sub(txn.vendor_reduced))
                };

                let event = CommissionAction::RefundApplied {
                    refund_event_id,
                    key,
                    amount,
                    vendor_reduction,
                };
                Self::apply_event(state, &event);
                SmallVec::new()
            }

            CommissionAction::MarkApproved { keys } => {
                Self::apply_event(state, &CommissionAction::Approved { keys });
                SmallVec::new()
            }

            CommissionAction::MarkPaid { keys } => {
                Self::apply_event(state, &CommissionAction::Paid { keys });
                SmallVec::new()
            }

            CommissionAction::ReleaseApproval { keys } => {
                Self::apply_event(state, &CommissionAction::ApprovalReleased { keys });
                SmallVec::new()
            }

            // ========== Events (replay) ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{OrderId, VendorId};
    use payouts_testing::{test_clock, test_time, ReducerTest};

    fn env() -> CommissionEnvironment {
        CommissionEnvironment {
            clock: test_clock(),
        }
    }

    fn settled(vendor_id: VendorId, key: LineItemKey, amount: Money) -> SettledLineItem {
        SettledLineItem {
            key,
            vendor_id,
            original_amount: amount,
            currency: crate::types::Currency::new("AED"),
            settled_at: test_time(),
        }
    }

    #[test]
    fn split_is_exact_at_ten_percent() {
        let (platform, vendor) = split_amount(
            Money::from_major(100),
            CommissionRate::from_percent(10),
            RoundingMode::HalfUp,
        );
        assert_eq!(platform, Money::from_major(10));
        assert_eq!(vendor, Money::from_major(90));
    }

    #[test]
    fn split_rounds_half_up_and_reconstructs() {
        // 10.01 at 12.5% -> platform 125.125 cents, rounds to 125
        let amount = Money::from_minor(1001);
        let (platform, vendor) = split_amount(
            amount,
            CommissionRate::from_basis_points(1250),
            RoundingMode::HalfUp,
        );
        assert_eq!(platform, Money::from_minor(125));
        assert_eq!(platform.saturating_add(vendor), amount);

        // 0.02 at 25% -> exactly 0.5 cents, half-up rounds to 1
        let (platform, _) = split_amount(
            Money::from_minor(2),
            CommissionRate::from_basis_points(2500),
            RoundingMode::HalfUp,
        );
        assert_eq!(platform, Money::from_minor(1));
    }

    #[test]
    fn split_half_even_breaks_ties_to_even() {
        // 0.02 at 25% -> 0.5 cents; quotient 0 is even, stays 0
        let (platform, _) = split_amount(
            Money::from_minor(2),
            CommissionRate::from_basis_points(2500),
            RoundingMode::HalfEven,
        );
        assert_eq!(platform, Money::ZERO);

        // 0.06 at 25% -> 1.5 cents; quotient 1 is odd, rounds to 2
        let (platform, _) = split_amount(
            Money::from_minor(6),
            CommissionRate::from_basis_points(2500),
            RoundingMode::HalfEven,
        );
        assert_eq!(platform, Money::from_minor(2));
    }

    #[test]
    fn recognition_creates_pending_transaction() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);

        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, key, Money::from_major(100)),
                rate: CommissionRate::from_percent(10),
                rounding: RoundingMode::HalfUp,
            })
            .then_state(move |state| {
                let txn = state.find(key).unwrap();
                assert_eq!(txn.platform_commission, Money::from_major(10));
                assert_eq!(txn.vendor_commission, Money::from_major(90));
                assert_eq!(txn.status, CommissionStatus::Pending);
                assert_eq!(txn.calculated_at, test_time());
            })
            .run();
    }

    #[test]
    fn duplicate_recognition_is_rejected() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);
        let recognize = CommissionAction::RecognizeLineItem {
            item: settled(vendor_id, key, Money::from_major(100)),
            rate: CommissionRate::from_percent(10),
            rounding: RoundingMode::HalfUp,
        };

        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(recognize.clone())
            .when_action(recognize)
            .then_state(|state| {
                assert_eq!(state.transactions.len(), 1);
                assert!(matches!(
                    state.last_rejection,
                    Some(Rejection::DuplicateRecognition { .. })
                ));
            })
            .run();
    }

    #[test]
    fn zero_rate_recognition_keeps_full_vendor_share() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);

        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, key, Money::from_major(200)),
                rate: CommissionRate::from_basis_points(0),
                rounding: RoundingMode::HalfUp,
            })
            .then_state(move |state| {
                let txn = state.find(key).unwrap();
                assert_eq!(txn.platform_commission, Money::ZERO);
                assert_eq!(txn.vendor_commission, Money::from_major(200));
            })
            .run();
    }

    #[test]
    fn partial_refund_reduces_vendor_share_proportionally() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);

        // 100.00 at 10%, then a 30.00 gross refund: vendor reduced by 27.00
        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, key, Money::from_major(100)),
                rate: CommissionRate::from_percent(10),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::RefundLineItem {
                refund_event_id: RefundEventId::new(),
                key,
                amount: Money::from_major(30),
                rounding: RoundingMode::HalfUp,
            })
            .then_state(move |state| {
                let txn = state.find(key).unwrap();
                assert_eq!(txn.refunded_amount, Money::from_major(30));
                assert_eq!(txn.vendor_reduced, Money::from_major(27));
                assert_eq!(txn.refundable_remainder(), Money::from_major(70));
            })
            .run();
    }

    #[test]
    fn duplicate_refund_event_is_applied_once() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);
        let refund_event_id = RefundEventId::new();
        let refund = CommissionAction::RefundLineItem {
            refund_event_id,
            key,
            amount: Money::from_major(30),
            rounding: RoundingMode::HalfUp,
        };

        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, key, Money::from_major(100)),
                rate: CommissionRate::from_percent(10),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(refund.clone())
            .when_action(refund)
            .then_state(move |state| {
                let txn = state.find(key).unwrap();
                assert_eq!(txn.refunded_amount, Money::from_major(30));
                assert!(matches!(
                    state.last_rejection,
                    Some(Rejection::DuplicateRefund { .. })
                ));
            })
            .run();
    }

    #[test]
    fn refund_beyond_remainder_is_rejected() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);

        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, key, Money::from_major(100)),
                rate: CommissionRate::from_percent(10),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::RefundLineItem {
                refund_event_id: RefundEventId::new(),
                key,
                amount: Money::from_major(60),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::RefundLineItem {
                refund_event_id: RefundEventId::new(),
                key,
                amount: Money::from_major(60),
                rounding: RoundingMode::HalfUp,
            })
            .then_state(move |state| {
                let txn = state.find(key).unwrap();
                assert_eq!(txn.refunded_amount, Money::from_major(60));
                assert!(matches!(
                    state.last_rejection,
                    Some(Rejection::InvalidRefund { .. })
                ));
            })
            .run();
    }

    #[test]
    fn full_refund_after_partials_reverses_vendor_share_exactly() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);

        // Awkward split: 99.99 at 3.33% leaves rounding residue on partials
        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, key, Money::from_minor(9999)),
                rate: CommissionRate::from_basis_points(333),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::RefundLineItem {
                refund_event_id: RefundEventId::new(),
                key,
                amount: Money::from_minor(3333),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::RefundLineItem {
                refund_event_id: RefundEventId::new(),
                key,
                amount: Money::from_minor(6666),
                rounding: RoundingMode::HalfUp,
            })
            .then_state(move |state| {
                let txn = state.find(key).unwrap();
                assert_eq!(txn.refunded_amount, txn.original_amount);
                assert_eq!(txn.vendor_reduced, txn.vendor_commission);
                assert_eq!(txn.refundable_remainder(), Money::ZERO);
            })
            .run();
    }

    #[test]
    fn refund_against_unknown_line_item_is_rejected() {
        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RefundLineItem {
                refund_event_id: RefundEventId::new(),
                key: LineItemKey::new(OrderId::new(), 0),
                amount: Money::from_major(10),
                rounding: RoundingMode::HalfUp,
            })
            .then_state(|state| {
                assert!(matches!(
                    state.last_rejection,
                    Some(Rejection::UnknownLineItem { .. })
                ));
            })
            .run();
    }

    #[test]
    fn status_walk_is_forward_only() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);

        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, key, Money::from_major(100)),
                rate: CommissionRate::from_percent(10),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::MarkApproved { keys: vec![key] })
            .when_action(CommissionAction::MarkPaid { keys: vec![key] })
            .when_action(CommissionAction::MarkApproved { keys: vec![key] })
            .when_action(CommissionAction::ReleaseApproval { keys: vec![key] })
            .then_state(move |state| {
                // Paid records never drop back to Approved or Pending
                assert_eq!(state.find(key).unwrap().status, CommissionStatus::Paid);
            })
            .run();
    }

    #[test]
    fn marking_touches_only_the_covered_records() {
        let vendor_id = VendorId::new();
        let covered = LineItemKey::new(OrderId::new(), 0);
        let uncovered = LineItemKey::new(OrderId::new(), 0);

        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, covered, Money::from_major(100)),
                rate: CommissionRate::from_percent(10),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, uncovered, Money::from_major(100)),
                rate: CommissionRate::from_percent(10),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::MarkApproved {
                keys: vec![covered],
            })
            .when_action(CommissionAction::MarkPaid {
                keys: vec![covered],
            })
            .then_state(move |state| {
                assert_eq!(state.find(covered).unwrap().status, CommissionStatus::Paid);
                assert_eq!(
                    state.find(uncovered).unwrap().status,
                    CommissionStatus::Pending
                );
            })
            .run();
    }

    #[test]
    fn released_approval_returns_records_to_pending() {
        let vendor_id = VendorId::new();
        let key = LineItemKey::new(OrderId::new(), 0);

        ReducerTest::new(CommissionReducer::new())
            .with_env(env())
            .given_state(CommissionState::new())
            .when_action(CommissionAction::RecognizeLineItem {
                item: settled(vendor_id, key, Money::from_major(100)),
                rate: CommissionRate::from_percent(10),
                rounding: RoundingMode::HalfUp,
            })
            .when_action(CommissionAction::MarkApproved { keys: vec![key] })
            .when_action(CommissionAction::ReleaseApproval { keys: vec![key] })
            .then_state(move |state| {
                assert_eq!(
                    state.find(key).unwrap().status,
                    CommissionStatus::Pending
                );
            })
            .run();
    }
}
