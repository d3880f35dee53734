//! Demo binary: runs one vendor through the full earnings lifecycle
//! against in-memory collaborators.

use std::sync::Arc;

use payouts_core::environment::{Clock, SystemClock};
use payouts_engine::app::{EarningsEngine, PayoutOutcome};
use payouts_engine::config::Config;
use payouts_engine::directory::InMemoryVendorDirectory;
use payouts_engine::gateway::MockPayoutGateway;
use payouts_engine::store::InMemoryVendorStore;
use payouts_engine::types::{
    Currency, LineItemKey, Money, OrderId, PaymentMode, PayoutMethod, PayoutRequestId,
    RefundEventId, SettledLineItem, VendorAccount, VendorId,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let clock = Arc::new(SystemClock);
    let store = Arc::new(InMemoryVendorStore::new());
    let directory = Arc::new(InMemoryVendorDirectory::new());
    let gateway = Arc::new(MockPayoutGateway::new());

    let vendor_id = VendorId::new();
    directory
        .upsert(VendorAccount {
            vendor_id,
            display_name: "Desert Sound Stage".to_string(),
            mode: Some(PaymentMode::Commission { rate: None }),
            minimum_payout: Some(Money::from_major(50)),
            payout_method: PayoutMethod::BankTransfer {
                account_last_four: "4421".to_string(),
            },
            currency: Currency::new("AED"),
        })
        .await;

    let engine = EarningsEngine::new(store, directory, gateway, clock.clone(), config.engine);

    // Two ticket sales settle
    let order = OrderId::new();
    for line_index in 0..2 {
        engine
            .recognize_line_item(SettledLineItem {
                key: LineItemKey::new(order, line_index),
                vendor_id,
                original_amount: Money::from_major(100),
                currency: Currency::new("AED"),
                settled_at: clock.now(),
            })
            .await?;
    }

    // A buyer gets 30.00 back on the first line
    engine
        .apply_refund(
            vendor_id,
            RefundEventId::new(),
            LineItemKey::new(order, 0),
            Money::from_major(30),
        )
        .await?;

    // The vendor withdraws everything
    let request_id = PayoutRequestId::new();
    engine.request_payout(vendor_id, request_id, None).await?;
    engine.approve_payout(vendor_id, request_id).await?;
    engine
        .confirm_payout_result(vendor_id, request_id, PayoutOutcome::Completed)
        .await?;

    let summary = engine.earnings_summary(vendor_id).await?;
    tracing::info!(
        vendor_id = %summary.vendor_id,
        total_earned = %summary.ledger.total_earned,
        total_paid_out = %summary.ledger.total_paid_out,
        pending = %summary.ledger.pending_balance,
        "Lifecycle complete"
    );

    Ok(())
}
