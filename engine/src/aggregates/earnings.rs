//! Earnings ledger aggregate.
//!
//! The per-vendor running balance: the single source of truth for
//! vendor-owed money. Only the recognition pipeline, the refund adjuster,
//! and the payout state machine mutate it, and every mutation re-verifies
//! the accounting identity
//! `total_earned + clawback_owed == total_paid_out + in_processing + pending_balance`.
//! A violation freezes the ledger: the vendor's money is unaccounted for
//! and no further mutation is accepted until operators intervene.

use crate::error::Rejection;
use crate::types::{EarningsLedger, Money};
use payouts_core::{effect::Effect, reducer::Reducer, SmallVec};
use payouts_macros::Action;
use serde::{Deserialize, Serialize};

/// State of one vendor's earnings ledger
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// The running balances
    pub ledger: EarningsLedger,
    /// Why the last command was refused, if it was
    pub last_rejection: Option<Rejection>,
}

impl LedgerState {
    /// Creates an empty ledger state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes and clears the recorded rejection
    pub fn take_rejection(&mut self) -> Option<Rejection> {
        self.last_rejection.take()
    }
}

/// Actions for the earnings ledger (commands and events)
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum LedgerAction {
    // ========== Commands ==========
    /// Command: recognize earnings (settlement pipeline)
    #[command]
    Credit {
        /// Vendor share being recognized
        amount: Money,
    },

    /// Command: reserve pending funds for an approved payout
    #[command]
    Reserve {
        /// Amount moving `pending_balance -> in_processing`
        amount: Money,
    },

    /// Command: gateway confirmed the payout
    #[command]
    ConfirmPayout {
        /// Amount moving `in_processing -> total_paid_out`
        amount: Money,
    },

    /// Command: payout failed or was abandoned; restore the reservation
    #[command]
    ReleaseReservation {
        /// Amount moving `in_processing -> pending_balance`
        amount: Money,
    },

    /// Command: reverse previously recognized earnings (refund adjuster)
    #[command]
    ReverseEarnings {
        /// Vendor-side reduction to apply
        amount: Money,
    },

    // ========== Events ==========
    /// Event: earnings were recognized
    #[event]
    Credited {
        /// Amount recognized
        amount: Money,
        /// Portion that settled an outstanding clawback instead of
        /// becoming pending balance
        clawback_offset: Money,
    },

    /// Event: funds were reserved for a payout
    #[event]
    Reserved {
        /// Amount reserved
        amount: Money,
    },

    /// Event: a payout was confirmed
    #[event]
    PayoutConfirmed {
        /// Amount paid out
        amount: Money,
    },

    /// Event: a reservation was released back to pending
    #[event]
    ReservationReleased {
        /// Amount released
        amount: Money,
    },

    /// Event: earnings were reversed for a refund
    #[event]
    EarningsReversed {
        /// Total vendor-side reduction
        amount: Money,
        /// Portion taken from `pending_balance`
        from_pending: Money,
        /// Portion recorded as clawback because the funds were already
        /// paid out
        to_clawback: Money,
    },

    /// Event: the accounting identity broke; the ledger is frozen
    #[event]
    InvariantViolated {
        /// Snapshot of the inconsistent balances
        details: String,
    },

    /// Event: a command was refused
    #[event]
    CommandRejected {
        /// Why
        rejection: Rejection,
    },
}

/// Reducer for the earnings ledger
#[derive(Clone, Debug, Default)]
pub struct LedgerReducer;

impl LedgerReducer {
    /// Creates a new `LedgerReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn reject(state: &mut LedgerState, rejection: Rejection) {
        Self::apply_event(state, &LedgerAction::CommandRejected { rejection });
    }

    /// Applies an event to state
    fn apply_event(state: &mut LedgerState, action: &LedgerAction) {
        let ledger = &mut state.ledger;
        match action {
            LedgerAction::Credited {
                amount,
                clawback_offset,
            } => {
                ledger.total_earned = ledger.total_earned.saturating_add(*amount);
                ledger.clawback_owed = ledger.clawback_owed.saturating_sub(*clawback_offset);
                ledger.pending_balance = ledger
                    .pending_balance
                    .saturating_add(amount.saturating_sub(*clawback_offset));
                state.last_rejection = None;
            }
            LedgerAction::Reserved { amount } => {
                ledger.pending_balance = ledger.pending_balance.saturating_sub(*amount);
                ledger.in_processing = ledger.in_processing.saturating_add(*amount);
                state.last_rejection = None;
            }
            LedgerAction::PayoutConfirmed { amount } => {
                ledger.in_processing = ledger.in_processing.saturating_sub(*amount);
                ledger.total_paid_out = ledger.total_paid_out.saturating_add(*amount);
                state.last_rejection = None;
            }
            LedgerAction::ReservationReleased { amount } => {
                ledger.in_processing = ledger.in_processing.saturating_sub(*amount);
                ledger.pending_balance = ledger.pending_balance.saturating_add(*amount);
                state.last_rejection = None;
            }
            LedgerAction::EarningsReversed {
                amount,
                from_pending,
                to_clawback,
            } => {
                ledger.total_earned = ledger.total_earned.saturating_sub(*amount);
                ledger.pending_balance = ledger.pending_balance.saturating_sub(*from_pending);
                ledger.clawback_owed = ledger.clawback_owed.saturating_add(*to_clawback);
                state.last_rejection = None;
            }
            LedgerAction::InvariantViolated { details } => {
                ledger.frozen = true;
                state.last_rejection = Some(Rejection::InvariantViolated {
                    details: details.clone(),
                });
            }
            LedgerAction::CommandRejected { rejection } => {
                state.last_rejection = Some(rejection.clone());
            }
            // Commands are not applied to state
            LedgerAction::Credit { .. }
            | LedgerAction::Reserve { .. }
            | LedgerAction::ConfirmPayout { .. }
            | LedgerAction::ReleaseReservation { .. }
            | LedgerAction::ReverseEarnings { .. } => {}
        }
    }

    /// Applies a money event, then re-verifies the accounting identity.
    fn apply_and_verify(state: &mut LedgerState, event: &LedgerAction) {
        Self::apply_event(state, event);
        if !state.ledger.invariant_holds() {
            let details = format!(
                "total_earned={} clawback_owed={} total_paid_out={} in_processing={} pending_balance={}",
                state.ledger.total_earned,
                state.ledger.clawback_owed,
                state.ledger.total_paid_out,
                state.ledger.in_processing,
                state.ledger.pending_balance,
            );
            Self::apply_event(state, &LedgerAction::InvariantViolated { details });
        }
    }
}

impl Reducer for LedgerReducer {
    type State = LedgerState;
    type Action = LedgerAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        (): &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if state.ledger.frozen && action.is_command() {
            Self::reject(state, Rejection::LedgerFrozen);
            return SmallVec::new();
        }

        match action {
            // ========== Commands ==========
            LedgerAction::Credit { amount } => {
                let clawback_offset = state.ledger.clawback_owed.min(amount);
                let event = LedgerAction::Credited {
                    amount,
                    clawback_offset,
                };
                Self::apply_and_verify(state, &event);
                SmallVec::new()
            }

            LedgerAction::Reserve { amount } => {
                if amount.is_zero() {
                    Self::reject(
                        state,
                        Rejection::InvalidAmount {
                            reason: "reservation amount must be greater than zero".to_string(),
                        },
                    );
                    return SmallVec::new();
                }
                if amount > state.ledger.pending_balance {
                    Self::reject(
                        state,
                        Rejection::InsufficientBalance {
                            requested: amount,
                            available: state.ledger.pending_balance,
                        },
                    );
                    return SmallVec::new();
                }
                Self::apply_and_verify(state, &LedgerAction::Reserved { amount });
                SmallVec::new()
            }

            LedgerAction::ConfirmPayout { amount } => {
                if amount > state.ledger.in_processing {
                    Self::reject(
                        state,
                        Rejection::InvalidAmount {
                            reason: format!(
                                "confirmation of {amount} exceeds in-processing funds {}",
                                state.ledger.in_processing
                            ),
                        },
                    );
                    return SmallVec::new();
                }
                Self::apply_and_verify(state, &LedgerAction::PayoutConfirmed { amount });
                SmallVec::new()
            }

            LedgerAction::ReleaseReservation { amount } => {
                if amount > state.ledger.in_processing {
                    Self::reject(
                        state,
                        Rejection::InvalidAmount {
                            reason: format!(
                                "release of {amount} exceeds in-processing funds {}",
                                state.ledger.in_processing
                            ),
                        },
                    );
                    return SmallVec::new();
                }
                Self::apply_and_verify(state, &LedgerAction::ReservationReleased { amount });
                SmallVec::new()
            }

            LedgerAction::ReverseEarnings { amount } => {
                if amount > state.ledger.total_earned {
                    Self::reject(
                        state,
                        Rejection::InvalidAmount {
                            reason: format!(
                                "reversal of {amount} exceeds recognized earnings {}",
                                state.ledger.total_earned
                            ),
                        },
                    );
                    return SmallVec::new();
                }
                let from_pending = state.ledger.pending_balance.min(amount);
                let to_clawback = amount.saturating_sub(from_pending);
                let event = LedgerAction::EarningsReversed {
                    amount,
                    from_pending,
                    to_clawback,
                };
                Self::apply_and_verify(state, &event);
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
