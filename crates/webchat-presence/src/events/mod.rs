//! Membership change events.

pub mod types;

pub use types::{LeaveReason, MembershipEvent};
