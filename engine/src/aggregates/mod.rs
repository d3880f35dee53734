//! The four aggregates that make up one vendor's state.
//!
//! Each aggregate is a pure reducer: commands are validated against the
//! current state, valid commands apply an event, invalid commands record a
//! typed rejection that the service layer converts into a caller-facing
//! error. Side effects (gateway dispatch) are returned as effect
//! descriptions, never executed inside the reducer.

pub mod commission;
pub mod earnings;
pub mod payout;
pub mod subscription;
