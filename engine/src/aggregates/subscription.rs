//! Subscription ledger aggregate.
//!
//! Tracks recurring-fee billing cycles for subscription-mode vendors. The
//! standing ([`SubscriptionStatus`]) is never stored; it is derived from
//! `paid_until`, the grace window, and the suspension flag at read time, so
//! it can never go stale.

use std::sync::Arc;

use crate::error::Rejection;
use crate::types::{Money, SubscriptionPaymentRecord, SubscriptionPaymentStatus, SubscriptionStatus};
use chrono::Duration;
use payouts_core::{effect::Effect, environment::Clock, reducer::Reducer, DateTime, SmallVec, Utc};
use payouts_macros::Action;
use serde::{Deserialize, Serialize};

/// Recurring-fee standing for one vendor
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionState {
    /// Billing-cycle history, in recording order
    pub payments: Vec<SubscriptionPaymentRecord>,
    /// Instant the subscription is paid through; `None` until the first
    /// successful charge
    pub paid_until: Option<DateTime<Utc>>,
    /// Forced inactive by an admin or a gateway failure signal
    pub suspended: bool,
    /// Why the last command was refused, if it was
    pub last_rejection: Option<Rejection>,
}

impl SubscriptionState {
    /// Creates an empty subscription state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes and clears the recorded rejection
    pub fn take_rejection(&mut self) -> Option<Rejection> {
        self.last_rejection.take()
    }

    /// True when the vendor should lose catalog visibility: past the grace
    /// window or suspended.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, grace_period_days: i64) -> bool {
        matches!(
            self.status_at(now, grace_period_days),
            SubscriptionStatus::Expired | SubscriptionStatus::Suspended
        )
    }

    /// Derives the standing at `now` with a grace window of
    /// `grace_period_days` past `paid_until`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>, grace_period_days: i64) -> SubscriptionStatus {
        if self.suspended {
            return SubscriptionStatus::Suspended;
        }
        match self.paid_until {
            None => SubscriptionStatus::Expired,
            Some(paid_until) => {
                if now < paid_until {
                    SubscriptionStatus::Active
                } else if now < paid_until + Duration::days(grace_period_days) {
                    SubscriptionStatus::GracePeriod
                } else {
                    SubscriptionStatus::Expired
                }
            }
        }
    }
}

/// Environment for the subscription reducer
#[derive(Clone)]
pub struct SubscriptionEnvironment {
    /// Time source for `paid_at` stamps
    pub clock: Arc<dyn Clock>,
}

/// Actions for the subscription aggregate (commands and events)
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum SubscriptionAction {
    // ========== Commands ==========
    /// Command: a billing-cycle charge settled
    #[command]
    RecordPayment {
        /// Billing period start (inclusive)
        period_start: DateTime<Utc>,
        /// Billing period end (exclusive)
        period_end: DateTime<Utc>,
        /// Fee charged for the cycle
        amount: Money,
    },

    /// Command: a billing-cycle charge was attempted and failed
    #[command]
    RecordFailedPayment {
        /// Billing period start (inclusive)
        period_start: DateTime<Utc>,
        /// Billing period end (exclusive)
        period_end: DateTime<Utc>,
        /// Fee that failed to collect
        amount: Money,
    },

    /// Command: force the subscription inactive
    #[command]
    MarkSuspended,

    // ========== Events ==========
    /// Event: a settled charge was recorded; `paid_until` advanced
    #[event]
    PaymentRecorded {
        /// The cycle record
        record: SubscriptionPaymentRecord,
    },

    /// Event: a failed charge was recorded; `paid_until` unchanged
    #[event]
    PaymentFailureRecorded {
        /// The cycle record
        record: SubscriptionPaymentRecord,
    },

    /// Event: the subscription was suspended
    #[event]
    Suspended,

    /// Event: a command was refused
    #[event]
    CommandRejected {
        /// Why
        rejection: Rejection,
    },
}

/// Reducer for the subscription aggregate
#[derive(Clone, Debug, Default)]
pub struct SubscriptionReducer;

impl SubscriptionReducer {
    /// Creates a new `SubscriptionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn reject(state: &mut SubscriptionState, rejection: Rejection) {
        Self::apply_event(state, &SubscriptionAction::CommandRejected { rejection });
    }

    fn validate_period(
        state: &mut SubscriptionState,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> bool {
        if period_end <= period_start {
            Self::reject(
                state,
                Rejection::InvalidPeriod {
                    reason: format!("period end {period_end} is not after start {period_start}"),
                },
            );
            return false;
        }
        true
    }

    /// Applies an event to state
    fn apply_event(state: &mut SubscriptionState, action: &SubscriptionAction) {
        match action {
            SubscriptionAction::PaymentRecorded { record } => {
                let advanced = state
                    .paid_until
                    .map_or(record.period_end, |until| until.max(record.period_end));
                state.paid_until = Some(advanced);
                state.payments.push(record.clone());
                // A settled charge reinstates a suspended subscription
                state.suspended = false;
                state.last_rejection = None;
            }
            SubscriptionAction::PaymentFailureRecorded { record } => {
                state.payments.push(record.clone());
                state.last_rejection = None;
            }
            SubscriptionAction::Suspended => {
                state.suspended = true;
                state.last_rejection = None;
            }
            SubscriptionAction::CommandRejected { rejection } => {
                state.last_rejection = Some(rejection.clone());
            }
            // Commands are not applied to state
            SubscriptionAction::RecordPayment { .. }
            | SubscriptionAction::RecordFailedPayment { .. }
            | SubscriptionAction::MarkSuspended => {}
        }
    }
}

impl Reducer for SubscriptionReducer {
    type State = SubscriptionState;
    type Action = SubscriptionAction;
    type Environment = SubscriptionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            SubscriptionAction::RecordPayment {
                period_start,
                period_end,
                amount,
            } => {
                if !Self::validate_period(state, period_start, period_end) {
                    return SmallVec::new();
                }
                let duplicate = state.payments.iter().any(|record| {
                    record.period_start == period_start
                        && record.status == SubscriptionPaymentStatus::Paid
                });
                if duplicate {
                    Self::reject(
                        state,
                        Rejection::InvalidPeriod {
                            reason: format!("period starting {period_start} is already paid"),
                        },
                    );
                    return SmallVec::new();
                }

                let record = SubscriptionPaymentRecord {
                    period_start,
                    period_end,
                    amount,
                    status: SubscriptionPaymentStatus::Paid,
                    paid_at: env.clock.now(),
                };
                Self::apply_event(state, &SubscriptionAction::PaymentRecorded { record });
                SmallVec::new()
            }

            SubscriptionAction::RecordFailedPayment {
                period_start,
                period_end,
                amount,
            } => {
                if !Self::validate_period(state, period_start, period_end) {
                    return SmallVec::new();
                }
                let record = SubscriptionPaymentRecord {
                    period_start,
                    period_end,
                    amount,
                    status: SubscriptionPaymentStatus::Failed,
                    paid_at: env.clock.now(),
                };
                Self::apply_event(state, &SubscriptionAction::PaymentFailureRecorded { record });
                SmallVec::new()
            }

            SubscriptionAction::MarkSuspended => {
                Self::apply_event(state, &SubscriptionAction::Suspended);
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
