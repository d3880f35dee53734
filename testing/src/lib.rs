//! # Payouts Testing
//!
//! Testing utilities for the payout engine:
//! - [`ReducerTest`]: fluent Given-When-Then harness for reducer tests
//! - [`assertions`]: effect assertion helpers
//! - [`test_clock`]: deterministic clock for reproducible timestamps
//!
//! ## Example
//!
//! ```ignore
//! use payouts_testing::{assertions, ReducerTest, test_clock};
//!
//! ReducerTest::new(LedgerReducer::new())
//!     .with_env(LedgerEnvironment::new(test_clock()))
//!     .given_state(LedgerState::new())
//!     .when_action(LedgerAction::Credit { vendor_id, amount })
//!     .then_state(|state| assert_eq!(state.pending_balance(&vendor_id), amount))
//!     .then_effects(assertions::assert_no_effects)
//!     .run();
//! ```

mod reducer_test;

pub use reducer_test::{assertions, ReducerTest};

use chrono::{DateTime, Utc};
use payouts_core::environment::FixedClock;
use std::sync::Arc;

/// Create a shared fixed clock for tests (2025-01-01 00:00:00 UTC).
///
/// # Panics
///
/// Panics if the hardcoded timestamp fails to parse, which cannot happen.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(test_time()))
}

/// The instant [`test_clock`] reports.
///
/// # Panics
///
/// Panics if the hardcoded timestamp fails to parse, which cannot happen.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
        .expect("hardcoded timestamp should always parse")
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use payouts_core::environment::Clock;

    #[test]
    fn test_clock_is_fixed() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), test_time());
    }
}
