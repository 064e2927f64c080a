//! Membership event definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use webchat_core::types::{Nick, RoomName};
use webchat_core::AppResult;

/// Why a nick left rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// Session ended (logout or disconnect).
    Disconnect,
    /// The user left a single room.
    Leave,
    /// No heartbeat within the idle timeout.
    Expired,
}

/// A membership change, published after it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MembershipEvent {
    /// A nick entered rooms.
    Joined {
        /// The nick.
        nick: Nick,
        /// Rooms newly joined.
        rooms: Vec<RoomName>,
        /// Rooms created by this join.
        opened: Vec<RoomName>,
        /// When the change was applied.
        timestamp: DateTime<Utc>,
    },
    /// A nick left rooms.
    Left {
        /// The nick.
        nick: Nick,
        /// Rooms left.
        rooms: Vec<RoomName>,
        /// Rooms deleted because they became empty.
        closed: Vec<RoomName>,
        /// Why the nick left.
        reason: LeaveReason,
        /// When the change was applied.
        timestamp: DateTime<Utc>,
    },
}

impl MembershipEvent {
    /// The nick this event concerns.
    pub fn nick(&self) -> &Nick {
        match self {
            Self::Joined { nick, .. } | Self::Left { nick, .. } => nick,
        }
    }

    /// Rooms whose membership changed.
    pub fn rooms(&self) -> &[RoomName] {
        match self {
            Self::Joined { rooms, .. } | Self::Left { rooms, .. } => rooms,
        }
    }

    /// Serialize to JSON for presentation glue.
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
