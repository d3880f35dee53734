//! Engine service layer.
//!
//! [`EarningsEngine`] is the one write path: every operation loads the
//! vendor's state, runs the relevant reducers, and saves the result with a
//! compare-and-swap on the version stamp. A lost swap reloads and replays
//! the whole operation, bounded by `max_save_attempts`; concurrent
//! operations on the same vendor serialize through this loop while
//! different vendors proceed independently.

use std::sync::Arc;

use crate::aggregates::commission::{CommissionAction, CommissionEnvironment, CommissionReducer};
use crate::aggregates::earnings::{LedgerAction, LedgerReducer};
use crate::aggregates::payout::{PayoutAction, PayoutEnvironment, PayoutReducer, PendingShare};
use crate::aggregates::subscription::{
    SubscriptionAction, SubscriptionEnvironment, SubscriptionReducer,
};
use crate::config::EngineConfig;
use crate::directory::VendorDirectory;
use crate::error::{EngineError, Rejection, StoreError};
use crate::gateway::PayoutGateway;
use crate::store::VendorStore;
use crate::types::{
    CommissionRate, CommissionStatus, CommissionTransaction, LineItemKey, Money, PaymentMode,
    PayoutRequest,
    PayoutRequestId, RefundEventId, SettledLineItem, SubscriptionPaymentRecord, VendorAccount,
    VendorId, VendorState,
};
use crate::views::{
    self, CommissionHistoryPage, EarningsSummary, PayoutHistoryPage, SubscriptionStatusView,
};
use payouts_core::{effect::Effect, environment::Clock, reducer::Reducer, DateTime, SmallVec, Utc};

/// Final outcome of a dispatched payout, as reported by the rail
#[derive(Clone, Debug)]
pub enum PayoutOutcome {
    /// The transfer landed
    Completed,
    /// The transfer failed
    Failed {
        /// Rail-provided reason
        reason: String,
    },
}

/// How an update closure wants its result handled
enum Mutation<T> {
    /// Save the mutated state, then return the value
    Apply(T),
    /// Nothing changed (idempotency hit); skip the save
    Noop(T),
    /// Save the mutated state (it carries a freeze), then fail
    Fail(EngineError),
}

/// The vendor earnings and payout engine
pub struct EarningsEngine {
    store: Arc<dyn VendorStore>,
    directory: Arc<dyn VendorDirectory>,
    gateway: Arc<dyn PayoutGateway>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    commission_reducer: CommissionReducer,
    ledger_reducer: LedgerReducer,
    payout_reducer: PayoutReducer,
    subscription_reducer: SubscriptionReducer,
}

impl EarningsEngine {
    /// Creates an engine over the given collaborators
    #[must_use]
    pub fn new(
        store: Arc<dyn VendorStore>,
        directory: Arc<dyn VendorDirectory>,
        gateway: Arc<dyn PayoutGateway>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            directory,
            gateway,
            clock,
            config,
            commission_reducer: CommissionReducer::new(),
            ledger_reducer: LedgerReducer::new(),
            payout_reducer: PayoutReducer::new(),
            subscription_reducer: SubscriptionReducer::new(),
        }
    }

    // ========== Settlement intake ==========

    /// Recognizes a settled line item as vendor earnings.
    ///
    /// Exactly-once per line item: a redelivery returns the existing
    /// commission transaction as a successful no-op. Under subscription
    /// billing the record is still created with a zero platform cut.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] when the vendor has no billing
    /// mode and no platform default covers it, and the usual store and
    /// validation errors otherwise.
    pub async fn recognize_line_item(
        &self,
        item: SettledLineItem,
    ) -> Result<CommissionTransaction, EngineError> {
        let vendor_id = item.vendor_id;
        let account = self.account(vendor_id).await?;
        let rate = self.effective_rate(&account)?;
        let rounding = self.config.rounding_mode;
        let key = item.key;

        let transaction = self
            .update(vendor_id, |state| {
                let command = CommissionAction::RecognizeLineItem {
                    item: item.clone(),
                    rate,
                    rounding,
                };
                if let Some(rejection) = self.reduce_commission(state, command) {
                    if matches!(rejection, Rejection::DuplicateRecognition { .. }) {
                        let existing = state.commissions.find(key).cloned();
                        return match existing {
                            Some(txn) => Ok(Mutation::Noop(txn)),
                            None => Err(EngineError::Validation(format!(
                                "duplicate recognition for {key} without a stored record"
                            ))),
                        };
                    }
                    return Err(self.rejection_error(vendor_id, rejection));
                }

                let transaction = state.commissions.find(key).cloned().ok_or_else(|| {
                    EngineError::Validation(format!("recognition of {key} produced no record"))
                })?;

                let credit = LedgerAction::Credit {
                    amount: transaction.vendor_commission,
                };
                match self.reduce_ledger(state, credit) {
                    None => Ok(Mutation::Apply(transaction)),
                    Some(rejection) => self.ledger_failure(state, vendor_id, rejection),
                }
            })
            .await?;

        tracing::info!(
            %vendor_id,
            line_item = %key,
            original = %transaction.original_amount,
            platform = %transaction.platform_commission,
            vendor = %transaction.vendor_commission,
            "Line item recognized"
        );
        Ok(transaction)
    }

    /// Applies a gateway-confirmed refund against a recognized line item.
    ///
    /// Exactly-once per refund event id: a redelivery returns the current
    /// transaction as a successful no-op. The vendor-side reduction comes
    /// out of the pending balance first; any excess over what is still
    /// pending becomes a clawback receivable, netted against future
    /// recognitions.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRefund`] when the amount exceeds the
    /// refundable remainder, plus the usual store errors.
    pub async fn apply_refund(
        &self,
        vendor_id: VendorId,
        refund_event_id: RefundEventId,
        key: LineItemKey,
        amount: Money,
    ) -> Result<CommissionTransaction, EngineError> {
        let rounding = self.config.rounding_mode;

        let transaction = self
            .update(vendor_id, |state| {
                let before = state
                    .commissions
                    .find(key)
                    .map_or(Money::ZERO, |txn| txn.vendor_reduced);

                let command = CommissionAction::RefundLineItem {
                    refund_event_id,
                    key,
                    amount,
                    rounding,
                };
                if let Some(rejection) = self.reduce_commission(state, command) {
                    if matches!(rejection, Rejection::DuplicateRefund { .. }) {
                        let existing = state.commissions.find(key).cloned();
                        return match existing {
                            Some(txn) => Ok(Mutation::Noop(txn)),
                            None => Err(EngineError::Validation(format!(
                                "duplicate refund event {refund_event_id} without a stored record"
                            ))),
                        };
                    }
                    return Err(self.rejection_error(vendor_id, rejection));
                }

                let transaction = state.commissions.find(key).cloned().ok_or_else(|| {
                    EngineError::Validation(format!("refund against {key} lost its record"))
                })?;

                let vendor_delta = transaction.vendor_reduced.saturating_sub(before);
                if vendor_delta.is_zero() {
                    return Ok(Mutation::Apply(transaction));
                }
                let reverse = LedgerAction::ReverseEarnings {
                    amount: vendor_delta,
                };
                match self.reduce_ledger(state, reverse) {
                    None => Ok(Mutation::Apply(transaction)),
                    Some(rejection) => self.ledger_failure(state, vendor_id, rejection),
                }
            })
            .await?;

        tracing::info!(
            %vendor_id,
            line_item = %key,
            refund_event = %refund_event_id,
            gross = %amount,
            vendor_reduced = %transaction.vendor_reduced,
            "Refund applied"
        );
        Ok(transaction)
    }

    // ========== Payout lifecycle ==========

    /// Records a vendor payout request.
    ///
    /// `amount: None` requests the full pending balance at approval time
    /// and must meet the vendor's minimum payout threshold; an explicit
    /// amount must be non-zero and within the pending balance.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InsufficientBalance`] on threshold or balance
    /// violations, plus the usual store errors.
    pub async fn request_payout(
        &self,
        vendor_id: VendorId,
        request_id: PayoutRequestId,
        amount: Option<Money>,
    ) -> Result<PayoutRequest, EngineError> {
        let account = self.account(vendor_id).await?;
        let minimum = account
            .minimum_payout
            .unwrap_or(self.config.minimum_payout_default);
        let method = account.payout_method.clone();

        let request = self
            .update(vendor_id, |state| {
                let command = PayoutAction::RequestPayout {
                    request_id,
                    vendor_id,
                    amount,
                    method: method.clone(),
                    available: state.ledger.ledger.pending_balance,
                    minimum,
                };
                let _ = self.reduce_payout(state, command);
                if let Some(rejection) = state.payouts.take_rejection() {
                    return Err(self.rejection_error(vendor_id, rejection));
                }
                let request = state.payouts.find(request_id).cloned().ok_or_else(|| {
                    EngineError::Validation("payout request was not recorded".to_string())
                })?;
                Ok(Mutation::Apply(request))
            })
            .await?;

        tracing::info!(
            %vendor_id,
            request_id = %request.id,
            amount = ?request.amount,
            "Payout requested"
        );
        Ok(request)
    }

    /// Approves a pending payout request, reserves the funds, and
    /// dispatches the transfer to the gateway.
    ///
    /// The dispatch outcome is folded back in before this returns: on
    /// acceptance the request is `Processing`, on refusal it is `Failed`
    /// and the reservation is released.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStateTransition`] unless the request
    /// is `Pending`, plus balance, store, and configuration errors.
    pub async fn approve_payout(
        &self,
        vendor_id: VendorId,
        request_id: PayoutRequestId,
    ) -> Result<PayoutRequest, EngineError> {
        let account = self.account(vendor_id).await?;
        let currency = account.currency.clone();

        let (request, effects) = self
            .update(vendor_id, |state| {
                let command = PayoutAction::ApprovePayout {
                    request_id,
                    available: state.ledger.ledger.pending_balance,
                    currency: currency.clone(),
                    pending_shares: pending_shares(state),
                };
                let effects = self.reduce_payout(state, command);
                if let Some(rejection) = state.payouts.take_rejection() {
                    return Err(self.rejection_error(vendor_id, rejection));
                }
                let request = state
                    .payouts
                    .find(request_id)
                    .cloned()
                    .ok_or(EngineError::RequestNotFound(request_id))?;
                let approved = request.approved_amount.ok_or_else(|| {
                    EngineError::Validation("approval did not pin an amount".to_string())
                })?;

                if let Some(rejection) =
                    self.reduce_ledger(state, LedgerAction::Reserve { amount: approved })
                {
                    return self.ledger_failure(state, vendor_id, rejection);
                }
                let _ = self.reduce_commission(
                    state,
                    CommissionAction::MarkApproved {
                        keys: request.covered_items.clone(),
                    },
                );

                Ok(Mutation::Apply((request, effects)))
            })
            .await?;

        tracing::info!(
            %vendor_id,
            %request_id,
            approved = ?request.approved_amount,
            "Payout approved, dispatching"
        );

        for feedback in drain_effects(effects).await {
            self.handle_dispatch_feedback(vendor_id, feedback).await?;
        }

        let state = self.load_or_new(vendor_id).await?;
        state
            .payouts
            .find(request_id)
            .cloned()
            .ok_or(EngineError::RequestNotFound(request_id))
    }

    /// Records the rail's final verdict on a dispatched payout.
    ///
    /// Completion moves the reserved funds to `total_paid_out` and marks
    /// the covered commissions paid; failure releases the reservation back
    /// to the pending balance and returns the covered commissions to
    /// pending. Only `Processing` requests accept a verdict, so
    /// a redelivered confirmation is refused rather than double-applied.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStateTransition`] for redeliveries and
    /// out-of-order verdicts, plus the usual store errors.
    pub async fn confirm_payout_result(
        &self,
        vendor_id: VendorId,
        request_id: PayoutRequestId,
        outcome: PayoutOutcome,
    ) -> Result<PayoutRequest, EngineError> {
        let request = self
            .update(vendor_id, |state| {
                let (approved, covered) = state
                    .payouts
                    .find(request_id)
                    .map_or((Money::ZERO, Vec::new()), |request| {
                        (
                            request.approved_amount.unwrap_or(Money::ZERO),
                            request.covered_items.clone(),
                        )
                    });

                let command = match &outcome {
                    PayoutOutcome::Completed => PayoutAction::ConfirmCompleted { request_id },
                    PayoutOutcome::Failed { reason } => PayoutAction::ConfirmFailed {
                        request_id,
                        reason: reason.clone(),
                    },
                };
                let _ = self.reduce_payout(state, command);
                if let Some(rejection) = state.payouts.take_rejection() {
                    return Err(self.rejection_error(vendor_id, rejection));
                }

                let ledger_command = match &outcome {
                    PayoutOutcome::Completed => LedgerAction::ConfirmPayout { amount: approved },
                    PayoutOutcome::Failed { .. } => {
                        LedgerAction::ReleaseReservation { amount: approved }
                    }
                };
                if let Some(rejection) = self.reduce_ledger(state, ledger_command) {
                    return self.ledger_failure(state, vendor_id, rejection);
                }
                match &outcome {
                    PayoutOutcome::Completed => {
                        let _ = self.reduce_commission(
                            state,
                            CommissionAction::MarkPaid { keys: covered },
                        );
                    }
                    PayoutOutcome::Failed { .. } => {
                        let _ = self.reduce_commission(
                            state,
                            CommissionAction::ReleaseApproval { keys: covered },
                        );
                    }
                }

                let request = state
                    .payouts
                    .find(request_id)
                    .cloned()
                    .ok_or(EngineError::RequestNotFound(request_id))?;
                Ok(Mutation::Apply(request))
            })
            .await?;

        tracing::info!(
            %vendor_id,
            %request_id,
            status = %request.status,
            "Payout resolved"
        );
        Ok(request)
    }

    /// Cancels a still-pending payout request.
    ///
    /// No funds are reserved while pending, so cancellation touches the
    /// ledger not at all.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStateTransition`] once the request has
    /// been approved or resolved.
    pub async fn cancel_payout_request(
        &self,
        vendor_id: VendorId,
        request_id: PayoutRequestId,
    ) -> Result<PayoutRequest, EngineError> {
        let request = self
            .update(vendor_id, |state| {
                let _ = self.reduce_payout(state, PayoutAction::CancelPayout { request_id });
                if let Some(rejection) = state.payouts.take_rejection() {
                    return Err(self.rejection_error(vendor_id, rejection));
                }
                let request = state
                    .payouts
                    .find(request_id)
                    .cloned()
                    .ok_or(EngineError::RequestNotFound(request_id))?;
                Ok(Mutation::Apply(request))
            })
            .await?;

        tracing::info!(%vendor_id, %request_id, "Payout request cancelled");
        Ok(request)
    }

    // ========== Subscription billing ==========

    /// Records a settled subscription charge for a billing period.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] unless the vendor is on
    /// subscription billing, and [`EngineError::Validation`] for inverted
    /// or already-paid periods.
    pub async fn record_subscription_payment(
        &self,
        vendor_id: VendorId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<SubscriptionPaymentRecord, EngineError> {
        let fee = self.subscription_fee(vendor_id).await?;
        self.record_subscription_cycle(
            vendor_id,
            SubscriptionAction::RecordPayment {
                period_start,
                period_end,
                amount: fee,
            },
        )
        .await
    }

    /// Records a failed subscription charge attempt. The paid-through
    /// instant does not move; standing degrades through the grace window.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::record_subscription_payment`].
    pub async fn record_failed_subscription_payment(
        &self,
        vendor_id: VendorId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<SubscriptionPaymentRecord, EngineError> {
        let fee = self.subscription_fee(vendor_id).await?;
        self.record_subscription_cycle(
            vendor_id,
            SubscriptionAction::RecordFailedPayment {
                period_start,
                period_end,
                amount: fee,
            },
        )
        .await
    }

    /// Forces a vendor's subscription inactive until the next settled
    /// charge.
    ///
    /// # Errors
    ///
    /// Returns the usual store errors.
    pub async fn suspend_subscription(&self, vendor_id: VendorId) -> Result<(), EngineError> {
        self.update(vendor_id, |state| {
            let _ = self.reduce_subscription(state, SubscriptionAction::MarkSuspended);
            if let Some(rejection) = state.subscription.take_rejection() {
                return Err(self.rejection_error(vendor_id, rejection));
            }
            Ok(Mutation::Apply(()))
        })
        .await?;

        tracing::warn!(%vendor_id, "Subscription suspended");
        Ok(())
    }

    // ========== Read views ==========

    /// Earnings dashboard summary for a vendor
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VendorNotFound`] for an unknown vendor and
    /// [`EngineError::Store`] on load failure.
    pub async fn earnings_summary(&self, vendor_id: VendorId) -> Result<EarningsSummary, EngineError> {
        let account = self.account(vendor_id).await?;
        let state = self.load_or_new(vendor_id).await?;
        Ok(EarningsSummary::project(&state, account.currency))
    }

    /// One page of commission history, newest first
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on load failure.
    pub async fn commission_history(
        &self,
        vendor_id: VendorId,
        page: usize,
        limit: usize,
    ) -> Result<CommissionHistoryPage, EngineError> {
        let state = self.load_or_new(vendor_id).await?;
        Ok(views::commission_history(&state, page, limit))
    }

    /// One page of payout history, newest first
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on load failure.
    pub async fn payout_history(
        &self,
        vendor_id: VendorId,
        page: usize,
        limit: usize,
    ) -> Result<PayoutHistoryPage, EngineError> {
        let state = self.load_or_new(vendor_id).await?;
        Ok(views::payout_history(&state, page, limit))
    }

    /// The approval queue: still-pending requests, oldest first
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on load failure.
    pub async fn pending_payout_requests(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<PayoutRequest>, EngineError> {
        let state = self.load_or_new(vendor_id).await?;
        Ok(views::pending_requests(&state))
    }

    /// Subscription standing, derived at the current instant
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] on load failure.
    pub async fn subscription_status(
        &self,
        vendor_id: VendorId,
    ) -> Result<SubscriptionStatusView, EngineError> {
        let state = self.load_or_new(vendor_id).await?;
        Ok(views::subscription_status(
            &state,
            self.clock.now(),
            self.config.grace_period_days,
        ))
    }

    // ========== Internals ==========

    async fn account(&self, vendor_id: VendorId) -> Result<VendorAccount, EngineError> {
        self.directory
            .vendor(vendor_id)
            .await?
            .ok_or(EngineError::VendorNotFound(vendor_id))
    }

    fn effective_rate(&self, account: &VendorAccount) -> Result<CommissionRate, EngineError> {
        match &account.mode {
            None => Err(EngineError::Configuration {
                vendor_id: account.vendor_id,
                reason: "no payment mode configured".to_string(),
            }),
            Some(PaymentMode::Commission { rate }) => rate
                .or(self.config.default_commission_rate)
                .ok_or_else(|| EngineError::Configuration {
                    vendor_id: account.vendor_id,
                    reason: "no commission rate and no platform default".to_string(),
                }),
            // Subscription vendors keep the full sale amount; the record is
            // still created to anchor refund idempotency
            Some(PaymentMode::Subscription { .. }) => Ok(CommissionRate::from_basis_points(0)),
        }
    }

    async fn subscription_fee(&self, vendor_id: VendorId) -> Result<Money, EngineError> {
        let account = self.account(vendor_id).await?;
        match &account.mode {
            Some(PaymentMode::Subscription { fee, .. }) => Ok(*fee),
            _ => Err(EngineError::Configuration {
                vendor_id,
                reason: "vendor is not on subscription billing".to_string(),
            }),
        }
    }

    async fn record_subscription_cycle(
        &self,
        vendor_id: VendorId,
        command: SubscriptionAction,
    ) -> Result<SubscriptionPaymentRecord, EngineError> {
        let record = self
            .update(vendor_id, |state| {
                let _ = self.reduce_subscription(state, command.clone());
                if let Some(rejection) = state.subscription.take_rejection() {
                    return Err(self.rejection_error(vendor_id, rejection));
                }
                let record = state.subscription.payments.last().cloned().ok_or_else(|| {
                    EngineError::Validation("subscription cycle was not recorded".to_string())
                })?;
                Ok(Mutation::Apply(record))
            })
            .await?;

        tracing::info!(
            %vendor_id,
            period_start = %record.period_start,
            period_end = %record.period_end,
            status = ?record.status,
            "Subscription cycle recorded"
        );
        Ok(record)
    }

    async fn handle_dispatch_feedback(
        &self,
        vendor_id: VendorId,
        feedback: PayoutAction,
    ) -> Result<(), EngineError> {
        match feedback {
            PayoutAction::DispatchSucceeded {
                request_id,
                gateway_ref,
            } => {
                self.update(vendor_id, |state| {
                    let command = PayoutAction::DispatchSucceeded {
                        request_id,
                        gateway_ref: gateway_ref.clone(),
                    };
                    let _ = self.reduce_payout(state, command);
                    if let Some(rejection) = state.payouts.take_rejection() {
                        return Err(self.rejection_error(vendor_id, rejection));
                    }
                    Ok(Mutation::Apply(()))
                })
                .await
            }
            PayoutAction::DispatchFailed { request_id, reason } => {
                tracing::warn!(%vendor_id, %request_id, %reason, "Payout dispatch refused");
                self.update(vendor_id, |state| {
                    let (approved, covered) = state
                        .payouts
                        .find(request_id)
                        .map_or((Money::ZERO, Vec::new()), |request| {
                            (
                                request.approved_amount.unwrap_or(Money::ZERO),
                                request.covered_items.clone(),
                            )
                        });

                    let command = PayoutAction::DispatchFailed {
                        request_id,
                        reason: reason.clone(),
                    };
                    let _ = self.reduce_payout(state, command);
                    if let Some(rejection) = state.payouts.take_rejection() {
                        return Err(self.rejection_error(vendor_id, rejection));
                    }
                    if let Some(rejection) = self
                        .reduce_ledger(state, LedgerAction::ReleaseReservation { amount: approved })
                    {
                        return self.ledger_failure(state, vendor_id, rejection);
                    }
                    let _ = self.reduce_commission(
                        state,
                        CommissionAction::ReleaseApproval { keys: covered },
                    );
                    Ok(Mutation::Apply(()))
                })
                .await
            }
            other => Err(EngineError::Validation(format!(
                "unexpected dispatch feedback: {}",
                other.name()
            ))),
        }
    }

    /// Load-reduce-save with a bounded optimistic retry loop.
    async fn update<T, F>(&self, vendor_id: VendorId, mut apply: F) -> Result<T, EngineError>
    where
        F: FnMut(&mut VendorState) -> Result<Mutation<T>, EngineError>,
    {
        for attempt in 1..=self.config.max_save_attempts {
            let mut state = self.load_or_new(vendor_id).await?;
            match apply(&mut state)? {
                Mutation::Noop(value) => return Ok(value),
                Mutation::Apply(value) => match self.store.save(&state).await {
                    Ok(_) => return Ok(value),
                    Err(StoreError::VersionConflict { .. }) => {
                        tracing::debug!(%vendor_id, attempt, "Save lost the version race, retrying");
                    }
                    Err(error) => return Err(error.into()),
                },
                Mutation::Fail(error) => {
                    // Persist best-effort so a ledger freeze survives; the
                    // error wins either way
                    if let Err(save_error) = self.store.save(&state).await {
                        tracing::error!(%vendor_id, %save_error, "Failed to persist frozen state");
                    }
                    return Err(error);
                }
            }
        }
        Err(EngineError::Conflict(vendor_id))
    }

    async fn load_or_new(&self, vendor_id: VendorId) -> Result<VendorState, EngineError> {
        Ok(self
            .store
            .load(vendor_id)
            .await?
            .unwrap_or_else(|| VendorState::new(vendor_id)))
    }

    fn reduce_commission(
        &self,
        state: &mut VendorState,
        action: CommissionAction,
    ) -> Option<Rejection> {
        let env = CommissionEnvironment {
            clock: Arc::clone(&self.clock),
        };
        let _ = self
            .commission_reducer
            .reduce(&mut state.commissions, action, &env);
        state.commissions.take_rejection()
    }

    fn reduce_ledger(&self, state: &mut VendorState, action: LedgerAction) -> Option<Rejection> {
        let _ = self.ledger_reducer.reduce(&mut state.ledger, action, &());
        state.ledger.take_rejection()
    }

    fn reduce_payout(
        &self,
        state: &mut VendorState,
        action: PayoutAction,
    ) -> SmallVec<[Effect<PayoutAction>; 4]> {
        let env = PayoutEnvironment {
            clock: Arc::clone(&self.clock),
            gateway: Arc::clone(&self.gateway),
        };
        self.payout_reducer.reduce(&mut state.payouts, action, &env)
    }

    fn reduce_subscription(
        &self,
        state: &mut VendorState,
        action: SubscriptionAction,
    ) -> SmallVec<[Effect<SubscriptionAction>; 4]> {
        let env = SubscriptionEnvironment {
            clock: Arc::clone(&self.clock),
        };
        self.subscription_reducer
            .reduce(&mut state.subscription, action, &env)
    }

    fn rejection_error(&self, vendor_id: VendorId, rejection: Rejection) -> EngineError {
        let error = EngineError::from_rejection(vendor_id, rejection);
        if matches!(error, EngineError::LedgerInvariantViolation { .. }) {
            tracing::error!(%vendor_id, %error, "Ledger invariant violation");
        }
        error
    }

    /// Converts a ledger rejection into a mutation outcome: an invariant
    /// violation must persist the freeze, everything else fails without
    /// saving the half-applied state.
    fn ledger_failure<T>(
        &self,
        state: &VendorState,
        vendor_id: VendorId,
        rejection: Rejection,
    ) -> Result<Mutation<T>, EngineError> {
        let error = self.rejection_error(vendor_id, rejection);
        if state.ledger.ledger.frozen {
            Ok(Mutation::Fail(error))
        } else {
            Err(error)
        }
    }
}

/// Net still-pending vendor shares, in recognition order.
fn pending_shares(state: &VendorState) -> Vec<PendingShare> {
    state
        .commissions
        .transactions
        .iter()
        .filter(|txn| txn.status == CommissionStatus::Pending)
        .map(|txn| PendingShare {
            key: txn.key,
            amount: txn.vendor_commission.saturating_sub(txn.vendor_reduced),
        })
        .collect()
}

/// Awaits all effect futures and collects their feedback actions.
async fn drain_effects(effects: SmallVec<[Effect<PayoutAction>; 4]>) -> Vec<PayoutAction> {
    let mut queue: Vec<Effect<PayoutAction>> = effects.into_vec();
    let mut actions = Vec::new();
    while let Some(effect) = queue.pop() {
        match effect {
            Effect::None => {}
            Effect::Parallel(more) | Effect::Sequential(more) => queue.extend(more),
            Effect::Future(future) => {
                if let Some(action) = future.await {
                    actions.push(action);
                }
            }
        }
    }
    actions
}
