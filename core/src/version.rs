//! Optimistic-concurrency version numbers for persisted aggregate state.
//!
//! Every persisted vendor aggregate carries a [`Version`] counter. A save
//! supplies the version it loaded; the store rejects the write if the row
//! has moved on, and the caller re-loads and retries. This serializes all
//! mutations that touch one vendor's ledger without a process-wide lock,
//! which stays correct across multiple engine instances.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic version of a persisted aggregate row.
///
/// Versions start at 1 for the first persisted state; [`Version::initial`]
/// is what a freshly created aggregate is saved as.
///
/// # Examples
///
/// ```
/// use payouts_core::version::Version;
///
/// let v = Version::initial();
/// assert_eq!(v.value(), 1);
/// assert_eq!(v.next().value(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version assigned to the first persisted state of an aggregate.
    #[must_use]
    pub const fn initial() -> Self {
        Self(1)
    }

    /// Creates a version from a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the version a successful save advances to.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_advances_monotonically() {
        let v = Version::initial();
        assert!(v.next() > v);
        assert_eq!(v.next().next().value(), 3);
    }

    #[test]
    fn version_display() {
        assert_eq!(Version::new(7).to_string(), "v7");
    }
}
