//! Property tests for the money arithmetic and the ledger invariant.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use payouts_core::reducer::Reducer;
use payouts_engine::aggregates::commission::split_amount;
use payouts_engine::aggregates::earnings::{LedgerAction, LedgerReducer, LedgerState};
use payouts_engine::aggregates::payout::{
    PayoutAction, PayoutEnvironment, PayoutReducer, PayoutState,
};
use payouts_engine::gateway::MockPayoutGateway;
use payouts_engine::types::{
    CommissionRate, Currency, Money, PayoutMethod, PayoutRequestId, PayoutStatus, RoundingMode,
    VendorId,
};
use payouts_testing::test_clock;
use proptest::prelude::*;

fn rounding_mode() -> impl Strategy<Value = RoundingMode> {
    prop_oneof![Just(RoundingMode::HalfUp), Just(RoundingMode::HalfEven)]
}

proptest! {
    /// The split always reconstructs the original amount exactly.
    #[test]
    fn split_reconstructs_exactly(
        amount in 0u64..1_000_000_000,
        bps in 0u32..=10_000,
        mode in rounding_mode(),
    ) {
        let amount = Money::from_minor(amount);
        let rate = CommissionRate::from_basis_points(bps);
        let (platform, vendor) = split_amount(amount, rate, mode);

        prop_assert_eq!(platform.saturating_add(vendor), amount);
        prop_assert!(platform <= amount);
    }

    /// The rounded platform cut never strays more than half a minor unit
    /// from the exact product.
    #[test]
    fn split_rounding_error_is_bounded(
        amount in 0u64..1_000_000_000,
        bps in 0u32..=10_000,
        mode in rounding_mode(),
    ) {
        let (platform, _) = split_amount(
            Money::from_minor(amount),
            CommissionRate::from_basis_points(bps),
            mode,
        );
        let exact_times_scale = u128::from(amount) * u128::from(bps);
        let rounded_times_scale = u128::from(platform.minor_units()) * 10_000;
        let error = rounded_times_scale.abs_diff(exact_times_scale);
        prop_assert!(error <= 5_000, "error {} exceeds half a minor unit", error);
    }

    /// The boundary rates degenerate cleanly.
    #[test]
    fn split_edges(amount in 0u64..1_000_000_000, mode in rounding_mode()) {
        let amount = Money::from_minor(amount);

        let (platform, vendor) =
            split_amount(amount, CommissionRate::from_basis_points(0), mode);
        prop_assert_eq!(platform, Money::ZERO);
        prop_assert_eq!(vendor, amount);

        let (platform, vendor) =
            split_amount(amount, CommissionRate::from_basis_points(10_000), mode);
        prop_assert_eq!(platform, amount);
        prop_assert_eq!(vendor, Money::ZERO);
    }
}

#[derive(Clone, Debug)]
enum LedgerOp {
    Credit(u64),
    Reserve(u64),
    Confirm(u64),
    Release(u64),
    Reverse(u64),
}

fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    let amount = 0u64..50_000;
    prop_oneof![
        amount.clone().prop_map(LedgerOp::Credit),
        amount.clone().prop_map(LedgerOp::Reserve),
        amount.clone().prop_map(LedgerOp::Confirm),
        amount.clone().prop_map(LedgerOp::Release),
        amount.prop_map(LedgerOp::Reverse),
    ]
}

impl LedgerOp {
    fn into_action(self) -> LedgerAction {
        match self {
            Self::Credit(n) => LedgerAction::Credit {
                amount: Money::from_minor(n),
            },
            Self::Reserve(n) => LedgerAction::Reserve {
                amount: Money::from_minor(n),
            },
            Self::Confirm(n) => LedgerAction::ConfirmPayout {
                amount: Money::from_minor(n),
            },
            Self::Release(n) => LedgerAction::ReleaseReservation {
                amount: Money::from_minor(n),
            },
            Self::Reverse(n) => LedgerAction::ReverseEarnings {
                amount: Money::from_minor(n),
            },
        }
    }
}

proptest! {
    /// The accounting identity holds after every command in any sequence,
    /// accepted or rejected alike, and the ledger never freezes.
    #[test]
    fn invariant_survives_any_command_sequence(ops in prop::collection::vec(ledger_op(), 1..60)) {
        let reducer = LedgerReducer::new();
        let mut state = LedgerState::new();

        for op in ops {
            let _ = reducer.reduce(&mut state, op.into_action(), &());
            prop_assert!(
                state.ledger.invariant_holds(),
                "identity broke: {:?}",
                state.ledger
            );
            prop_assert!(!state.ledger.frozen);
        }
    }
}

#[derive(Clone, Debug)]
enum PayoutOp {
    Approve,
    DispatchOk,
    DispatchErr,
    ConfirmOk,
    ConfirmErr,
    Cancel,
}

fn payout_op() -> impl Strategy<Value = PayoutOp> {
    prop_oneof![
        Just(PayoutOp::Approve),
        Just(PayoutOp::DispatchOk),
        Just(PayoutOp::DispatchErr),
        Just(PayoutOp::ConfirmOk),
        Just(PayoutOp::ConfirmErr),
        Just(PayoutOp::Cancel),
    ]
}

fn legal_transition(from: PayoutStatus, to: PayoutStatus) -> bool {
    matches!(
        (from, to),
        (PayoutStatus::Pending, PayoutStatus::Approved | PayoutStatus::Cancelled)
            | (PayoutStatus::Approved, PayoutStatus::Processing | PayoutStatus::Failed)
            | (PayoutStatus::Processing, PayoutStatus::Completed | PayoutStatus::Failed)
    )
}

proptest! {
    /// Whatever command order arrives, a request only ever moves along the
    /// legal transition graph and terminal states stay terminal.
    #[test]
    fn payout_status_walk_is_always_legal(ops in prop::collection::vec(payout_op(), 1..40)) {
        let reducer = PayoutReducer::new();
        let env = PayoutEnvironment {
            clock: test_clock(),
            gateway: Arc::new(MockPayoutGateway::new()),
        };
        let request_id = PayoutRequestId::new();
        let vendor_id = VendorId::new();

        let mut state = PayoutState::new();
        let _ = reducer.reduce(
            &mut state,
            PayoutAction::RequestPayout {
                request_id,
                vendor_id,
                amount: Some(Money::from_major(100)),
                method: PayoutMethod::PlatformWallet,
                available: Money::from_major(100),
                minimum: Money::from_major(50),
            },
            &env,
        );
        prop_assert_eq!(state.find(request_id).unwrap().status, PayoutStatus::Pending);

        for op in ops {
            let before = state.find(request_id).unwrap().status;
            let action = match op {
                PayoutOp::Approve => PayoutAction::ApprovePayout {
                    request_id,
                    available: Money::from_major(100),
                    currency: Currency::new("AED"),
                    pending_shares: Vec::new(),
                },
                PayoutOp::DispatchOk => PayoutAction::DispatchSucceeded {
                    request_id,
                    gateway_ref: "ref".to_string(),
                },
                PayoutOp::DispatchErr => PayoutAction::DispatchFailed {
                    request_id,
                    reason: "refused".to_string(),
                },
                PayoutOp::ConfirmOk => PayoutAction::ConfirmCompleted { request_id },
                PayoutOp::ConfirmErr => PayoutAction::ConfirmFailed {
                    request_id,
                    reason: "bounced".to_string(),
                },
                PayoutOp::Cancel => PayoutAction::CancelPayout { request_id },
            };
            let _ = reducer.reduce(&mut state, action, &env);
            let after = state.find(request_id).unwrap().status;

            if before.is_terminal() {
                prop_assert_eq!(before, after, "terminal state moved");
            } else if before != after {
                prop_assert!(
                    legal_transition(before, after),
                    "illegal transition {} -> {}",
                    before,
                    after
                );
            }
        }
    }
}
