//! Payout request aggregate.
//!
//! Lifecycle: `Pending -> Approved -> Processing -> Completed`, with
//! `Failed` reachable from `Approved` (dispatch refused) or `Processing`
//! (rail reported failure) and `Cancelled` reachable from `Pending` only.
//! Terminal states never transition again; a redelivered confirmation for a
//! resolved request is refused, not re-applied.
//!
//! Approval returns a `Future` effect that hands the transfer to the
//! gateway and feeds the outcome back as `DispatchSucceeded` or
//! `DispatchFailed`. The fund movements themselves live in the earnings
//! ledger; the service layer drives both aggregates in lockstep.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Rejection;
use crate::gateway::{PayoutGateway, TransferInstruction};
use crate::types::{
    Currency, LineItemKey, Money, PayoutMethod, PayoutRequest, PayoutRequestId, PayoutStatus,
    VendorId,
};
use payouts_core::{effect::Effect, environment::Clock, reducer::Reducer, DateTime, SmallVec, Utc};
use payouts_macros::Action;
use serde::{Deserialize, Serialize};

/// Payout request book for one vendor
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoutState {
    /// All requests ever made, keyed by request id
    pub requests: HashMap<PayoutRequestId, PayoutRequest>,
    /// Why the last command was refused, if it was
    pub last_rejection: Option<Rejection>,
}

impl PayoutState {
    /// Creates an empty payout state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes and clears the recorded rejection
    pub fn take_rejection(&mut self) -> Option<Rejection> {
        self.last_rejection.take()
    }

    /// Looks up a request
    #[must_use]
    pub fn find(&self, request_id: PayoutRequestId) -> Option<&PayoutRequest> {
        self.requests.get(&request_id)
    }
}

/// Net vendor share still pending for one commission record, snapshotted
/// by the service layer when approving a payout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingShare {
    /// Line item the share belongs to
    pub key: LineItemKey,
    /// Vendor share net of refund reductions
    pub amount: Money,
}

/// Environment for the payout reducer
#[derive(Clone)]
pub struct PayoutEnvironment {
    /// Time source for request and resolution stamps
    pub clock: Arc<dyn Clock>,
    /// Rail the approved transfers are dispatched through
    pub gateway: Arc<dyn PayoutGateway>,
}

/// Actions for the payout aggregate (commands and events)
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum PayoutAction {
    // ========== Commands ==========
    /// Command: vendor requests a payout.
    ///
    /// `available` and `minimum` are snapshots taken by the service layer
    /// from the ledger and the vendor account; the reducer validates the
    /// request against them.
    #[command]
    RequestPayout {
        /// Identity chosen by the caller (idempotent retries reuse it)
        request_id: PayoutRequestId,
        /// Requesting vendor
        vendor_id: VendorId,
        /// Explicit amount; `None` means full balance at approval time
        amount: Option<Money>,
        /// Delivery method
        method: PayoutMethod,
        /// Pending balance at request time
        available: Money,
        /// Minimum payout threshold for this vendor
        minimum: Money,
    },

    /// Command: admin approves a pending request.
    ///
    /// `pending_shares` lists the still-pending commission shares in
    /// recognition order; the reducer records which of them the approved
    /// amount covers so only those advance when the transfer settles.
    #[command]
    ApprovePayout {
        /// Request to approve
        request_id: PayoutRequestId,
        /// Pending balance at approval time; pins the amount for
        /// full-balance requests
        available: Money,
        /// Transfer currency for the gateway instruction
        currency: Currency,
        /// Pending commission shares, oldest first
        pending_shares: Vec<PendingShare>,
    },

    /// Command: gateway accepted the dispatched transfer (approval feedback)
    #[command]
    DispatchSucceeded {
        /// Request that was dispatched
        request_id: PayoutRequestId,
        /// Rail-side reference
        gateway_ref: String,
    },

    /// Command: gateway refused the dispatched transfer (approval feedback)
    #[command]
    DispatchFailed {
        /// Request that was refused
        request_id: PayoutRequestId,
        /// Rail-provided reason
        reason: String,
    },

    /// Command: rail confirmed the transfer landed
    #[command]
    ConfirmCompleted {
        /// Request that completed
        request_id: PayoutRequestId,
    },

    /// Command: rail reported the transfer failed
    #[command]
    ConfirmFailed {
        /// Request that failed
        request_id: PayoutRequestId,
        /// Rail-provided reason
        reason: String,
    },

    /// Command: vendor withdraws a still-pending request
    #[command]
    CancelPayout {
        /// Request to cancel
        request_id: PayoutRequestId,
    },

    // ========== Events ==========
    /// Event: a payout request was recorded
    #[event]
    Requested {
        /// The new request
        request: PayoutRequest,
    },

    /// Event: a request was approved with a pinned amount
    #[event]
    Approved {
        /// Approved request
        request_id: PayoutRequestId,
        /// Amount reserved for the transfer
        approved_amount: Money,
        /// Line items the reserved amount fully covers
        covered_items: Vec<LineItemKey>,
    },

    /// Event: the gateway took custody of the transfer
    #[event]
    Dispatched {
        /// Dispatched request
        request_id: PayoutRequestId,
        /// Rail-side reference
        gateway_ref: String,
    },

    /// Event: the transfer landed (terminal)
    #[event]
    Completed {
        /// Completed request
        request_id: PayoutRequestId,
        /// When
        at: DateTime<Utc>,
    },

    /// Event: the transfer failed (terminal)
    #[event]
    Failed {
        /// Failed request
        request_id: PayoutRequestId,
        /// Why
        reason: String,
        /// When
        at: DateTime<Utc>,
    },

    /// Event: a pending request was withdrawn (terminal)
    #[event]
    Cancelled {
        /// Cancelled request
        request_id: PayoutRequestId,
        /// When
        at: DateTime<Utc>,
    },

    /// Event: a command was refused
    #[event]
    CommandRejected {
        /// Why
        rejection: Rejection,
    },
}

/// Reducer for the payout aggregate
#[derive(Clone, Debug, Default)]
pub struct PayoutReducer;

impl PayoutReducer {
    /// Creates a new `PayoutReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn reject(state: &mut PayoutState, rejection: Rejection) {
        Self::apply_event(state, &PayoutAction::CommandRejected { rejection });
    }

    fn reject_transition(state: &mut PayoutState, from: PayoutStatus, to: PayoutStatus) {
        Self::reject(state, Rejection::InvalidStateTransition { from, to });
    }

    /// Applies an event to state
    fn apply_event(state: &mut PayoutState, action: &PayoutAction) {
        match action {
            PayoutAction::Requested { request } => {
                state.requests.insert(request.id, request.clone());
                state.last_rejection = None;
            }
            PayoutAction::Approved {
                request_id,
                approved_amount,
                covered_items,
            } => {
                if let Some(request) = state.requests.get_mut(request_id) {
                    request.status = PayoutStatus::Approved;
                    request.approved_amount = Some(*approved_amount);
                    request.covered_items = covered_items.clone();
                }
                state.last_rejection = None;
            }
            PayoutAction::Dispatched {
                request_id,
                gateway_ref,
            } => {
                if let Some(request) = state.requests.get_mut(request_id) {
                    request.status = PayoutStatus::Processing;
                    request.gateway_ref = Some(gateway_ref.clone());
                }
                state.last_rejection = None;
            }
            PayoutAction::Completed { request_id, at } => {
                if let Some(request) = state.requests.get_mut(request_id) {
                    request.status = PayoutStatus::Completed;
                    request.resolved_at = Some(*at);
                }
                state.last_rejection = None;
            }
            PayoutAction::Failed {
                request_id,
                reason,
                at,
            } => {
                if let Some(request) = state.requests.get_mut(request_id) {
                    request.status = PayoutStatus::Failed;
                    request.failure_reason = Some(reason.clone());
                    request.resolved_at = Some(*at);
                }
                state.last_rejection = None;
            }
            PayoutAction::Cancelled { request_id, at } => {
                if let Some(request) = state.requests.get_mut(request_id) {
                    request.status = PayoutStatus::Cancelled;
                    request.resolved_at = Some(*at);
                }
                state.last_rejection = None;
            }
            PayoutAction::CommandRejected { rejection } => {
                state.last_rejection = Some(rejection.clone());
            }
            // Commands are not applied to state
            PayoutAction::RequestPayout { .. }
            | PayoutAction::ApprovePayout { .. }
            | PayoutAction::DispatchSucceeded { .. }
            | PayoutAction::DispatchFailed { .. }
            | PayoutAction::ConfirmCompleted { .. }
            | PayoutAction::ConfirmFailed { .. }
            | PayoutAction::CancelPayout { .. } => {}
        }
    }
}

impl Reducer for PayoutReducer {
    type State = PayoutState;
    type Action = PayoutAction;
    type Environment = PayoutEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            PayoutAction::RequestPayout {
                request_id,
                vendor_id,
                amount,
                method,
                available,
                minimum,
            } => {
                if state.requests.contains_key(&request_id) {
                    // Idempotent retry of the same request id
                    return SmallVec::new();
                }
                match amount {
                    Some(requested) => {
                        if requested.is_zero() {
                            Self::reject(
                                state,
                                Rejection::InvalidAmount {
                                    reason: "payout amount must be greater than zero".to_string(),
                                },
                            );
                            return SmallVec::new();
                        }
                        if requested > available {
                            Self::reject(
                                state,
                                Rejection::InsufficientBalance {
                                    requested,
                                    available,
                                },
                            );
                            return SmallVec::new();
                        }
                    }
                    None => {
                        if available < minimum {
                            Self::reject(state, Rejection::BelowMinimum { available, minimum });
                            return SmallVec::new();
                        }
                    }
                }

                let request = PayoutRequest {
                    id: request_id,
                    vendor_id,
                    amount,
                    approved_amount: None,
                    status: PayoutStatus::Pending,
                    method,
                    requested_at: env.clock.now(),
                    resolved_at: None,
                    gateway_ref: None,
                    failure_reason: None,
                    covered_items: Vec::new(),
                };
                Self::apply_event(state, &PayoutAction::Requested { request });
                SmallVec::new()
            }

            PayoutAction::ApprovePayout {
                request_id,
                available,
                currency,
                pending_shares,
            } => {
                let Some(request) = state.requests.get(&request_id) else {
                    Self::reject(state, Rejection::RequestNotFound { request_id });
                    return SmallVec::new();
                };
                if request.status != PayoutStatus::Pending {
                    Self::reject_transition(state, request.status, PayoutStatus::Approved);
                    return SmallVec::new();
                }

                // Explicit requests pin their own amount; full-balance
                // requests pin whatever is pending right now.
                let approved_amount = request.amount.unwrap_or(available);
                if approved_amount.is_zero() {
                    Self::reject(
                        state,
                        Rejection::InvalidAmount {
                            reason: "nothing to pay out".to_string(),
                        },
                    );
                    return SmallVec::new();
                }
                if approved_amount > available {
                    Self::reject(
                        state,
                        Rejection::InsufficientBalance {
                            requested: approved_amount,
                            available,
                        },
                    );
                    return SmallVec::new();
                }

                // Coverage walks the shares oldest first and stops at the
                // first one the approved amount no longer fully covers.
                let mut covered_items = Vec::new();
                let mut remaining = approved_amount;
                for share in &pending_shares {
                    if share.amount > remaining {
                        break;
                    }
                    remaining = remaining.saturating_sub(share.amount);
                    covered_items.push(share.key);
                }

                let instruction = TransferInstruction {
                    request_id,
                    vendor_id: request.vendor_id,
                    amount: approved_amount,
                    currency,
                    method: request.method.clone(),
                };
                Self::apply_event(
                    state,
                    &PayoutAction::Approved {
                        request_id,
                        approved_amount,
                        covered_items,
                    },
                );

                let gateway = Arc::clone(&env.gateway);
                let mut effects = SmallVec::new();
                effects.push(Effect::Future(Box::pin(async move {
                    match gateway.dispatch_transfer(instruction).await {
                        Ok(receipt) => Some(PayoutAction::DispatchSucceeded {
                            request_id,
                            gateway_ref: receipt.gateway_ref,
                        }),
                        Err(error) => Some(PayoutAction::DispatchFailed {
                            request_id,
                            reason: error.to_string(),
                        }),
                    }
                })));
                effects
            }

            PayoutAction::DispatchSucceeded {
                request_id,
                gateway_ref,
            } => {
                let Some(request) = state.requests.get(&request_id) else {
                    Self::reject(state, Rejection::RequestNotFound { request_id });
                    return SmallVec::new();
                };
                if request.status != PayoutStatus::Approved {
                    Self::reject_transition(state, request.status, PayoutStatus::Processing);
                    return SmallVec::new();
                }
                Self::apply_event(
                    state,
                    &PayoutAction::Dispatched {
                        request_id,
                        gateway_ref,
                    },
                );
                SmallVec::new()
            }

            PayoutAction::DispatchFailed { request_id, reason } => {
                let Some(request) = state.requests.get(&request_id) else {
                    Self::reject(state, Rejection::RequestNotFound { request_id });
                    return SmallVec::new();
                };
                if request.status != PayoutStatus::Approved {
                    Self::reject_transition(state, request.status, PayoutStatus::Failed);
                    return SmallVec::new();
                }
                Self::apply_event(
                    state,
                    &PayoutAction::Failed {
                        request_id,
                        reason,
                        at: env.clock.now(),
                    },
                );
                SmallVec::new()
            }

            PayoutAction::ConfirmCompleted { request_id } => {
                let Some(request) = state.requests.get(&request_id) else {
                    Self::reject(state, Rejection::RequestNotFound { request_id });
                    return SmallVec::new();
                };
                if request.status != PayoutStatus::Processing {
                    Self::reject_transition(state, request.status, PayoutStatus::Completed);
                    return SmallVec::new();
                }
                Self::apply_event(
                    state,
                    &PayoutAction::Completed {
                        request_id,
                        at: env.clock.now(),
                    },
                );
                SmallVec::new()
            }

            PayoutAction::ConfirmFailed { request_id, reason } => {
                let Some(request) = state.requests.get(&request_id) else {
                    Self::reject(state, Rejection::RequestNotFound { request_id });
                    return SmallVec::new();
                };
                if request.status != PayoutStatus::Processing {
                    Self::reject_transition(state, request.status, PayoutStatus::Failed);
                    return SmallVec::new();
                }
                Self::apply_event(
                    state,
                    &PayoutAction::Failed {
                        request_id,
                        reason,
                        at: env.clock.now(),
                    },
                );
                SmallVec::new()
            }

            PayoutAction::CancelPayout { request_id } => {
                let Some(request) = state.requests.get(&request_id) else {
                    Self::reject(state, Rejection::RequestNotFound { request_id });
                    return SmallVec::new();
                };
                if request.status != PayoutStatus::Pending {
                    Self::reject_transition(state, request.status, PayoutStatus::Cancelled);
                    return SmallVec::new();
                }
                Self::apply_event(
                    state,
                    &PayoutAction::Cancelled {
                        request_id,
                        at: env.clock.now(),
                    },
                );
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
