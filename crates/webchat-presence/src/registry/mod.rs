//! Room membership registry.

pub mod membership;
pub mod request;
pub mod state;


pub use membership::{MembershipRegistry, RegistryStats};
pub use request::JoinRequest;
pub use state::{InvariantViolation, RoomMembership};
