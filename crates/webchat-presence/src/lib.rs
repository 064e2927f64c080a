//! # webchat-presence
//!
//! In-memory presence registry for webchat. Provides:
//!
//! - Room membership with implicit room creation and deletion
//! - Global presence derived from membership
//! - Consistent snapshot queries in both directions (room → nicks, nick → rooms)
//! - Membership change events over a broadcast channel
//! - Idle expiry driven by heartbeats

pub mod events;
pub mod metrics;
pub mod registry;
pub mod sweeper;

pub use events::{LeaveReason, MembershipEvent};
pub use registry::{JoinRequest, MembershipRegistry, RegistryStats, RoomMembership};
pub use sweeper::PresenceSweeper;
