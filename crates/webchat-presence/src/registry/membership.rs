//! Membership registry: which nicks are in which rooms.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing;

use webchat_core::config::presence::PresenceConfig;
use webchat_core::types::{Nick, RoomName};

use super::request::JoinRequest;
use super::state::{
    InvariantViolation, JoinOutcome, LeaveOutcome, MembershipState, RoomMembership,
};

use crate::events::{LeaveReason, MembershipEvent};
use crate::metrics::{MetricsSnapshot, RegistryMetrics};

/// Process-wide registry of room membership and global presence.
///
/// One lock covers the whole state: writers hold it exclusively for the
/// full operation and readers copy out under the shared lock, so every
/// observer sees a state some serial order of operations could produce.
/// No method calls another public method while holding the lock.
#[derive(Debug)]
pub struct MembershipRegistry {
    state: RwLock<MembershipState>,
    events: broadcast::Sender<MembershipEvent>,
    metrics: RegistryMetrics,
}

/// Point-in-time registry figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Rooms currently mapped.
    pub rooms: usize,
    /// Nicks currently online.
    pub online: usize,
    /// Total (room, nick) memberships.
    pub memberships: usize,
    /// Cumulative counters.
    pub metrics: MetricsSnapshot,
}

impl MembershipRegistry {
    /// Creates an empty registry whose event channel buffers
    /// `event_buffer_size` events per receiver.
    pub fn new(event_buffer_size: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer_size.max(1));
        Self {
            state: RwLock::new(MembershipState::new()),
            events,
            metrics: RegistryMetrics::new(),
        }
    }

    /// Creates an empty registry from configuration.
    pub fn from_config(config: &PresenceConfig) -> Self {
        Self::new(config.event_buffer_size)
    }

    /// Adds `nick` to every room in `rooms`, creating missing rooms.
    ///
    /// Already-held memberships are left as they are. An empty room set
    /// changes nothing and does not bring the nick online.
    pub fn connect(&self, rooms: impl IntoIterator<Item = RoomName>, nick: &Nick) {
        let rooms: BTreeSet<RoomName> = rooms.into_iter().collect();
        self.apply_join(&rooms, nick, None);
    }

    /// Applies a join request.
    pub fn join(&self, request: &JoinRequest) {
        self.apply_join(&request.rooms, &request.nick, None);
    }

    /// Removes `nick` from each listed room it belongs to.
    ///
    /// Rooms left empty are deleted. The nick stays online only while it
    /// still belongs to a room not named here.
    pub fn disconnect(&self, rooms: impl IntoIterator<Item = RoomName>, nick: &Nick) {
        let rooms: Vec<RoomName> = rooms.into_iter().collect();
        self.apply_leave(nick, LeaveReason::Disconnect, |state| state.leave(nick, &rooms));
    }

    /// Removes `nick` from a single room.
    pub fn leave(&self, room: &RoomName, nick: &Nick) {
        self.apply_leave(nick, LeaveReason::Leave, |state| {
            state.leave(nick, std::iter::once(room))
        });
    }

    /// Removes `nick` from every room it occupies.
    pub fn disconnect_all(&self, nick: &Nick) {
        self.apply_leave(nick, LeaveReason::Disconnect, |state| state.leave_all(nick));
    }

    /// Records a heartbeat for an online nick.
    ///
    /// Returns `false` if the nick is not online.
    pub fn touch(&self, nick: &Nick) -> bool {
        let mut state = self.state.write();
        let now = Utc::now();
        state.touch(nick, now)
    }

    /// Disconnects every nick whose last activity precedes `cutoff`.
    ///
    /// Selection and removal happen under one write lock, so a heartbeat
    /// either lands before the sweep (and saves the nick) or after it.
    pub fn expire_idle(&self, cutoff: DateTime<Utc>) -> Vec<Nick> {
        let mut state = self.state.write();
        let now = Utc::now();
        let idle = state.idle_since(cutoff);

        for nick in &idle {
            let outcome = state.leave_all(nick);
            self.publish_leave(nick, outcome, LeaveReason::Expired, now);
        }

        idle
    }

    /// Copy of the full room → members mapping.
    pub fn list_users(&self) -> RoomMembership {
        self.state.read().membership()
    }

    /// Names of all rooms with at least one member.
    pub fn list_rooms(&self) -> BTreeSet<RoomName> {
        self.state.read().room_names()
    }

    /// Rooms whose members include `nick`.
    pub fn list_rooms_for(&self, nick: &Nick) -> BTreeSet<RoomName> {
        self.state.read().rooms_of(nick)
    }

    /// Members of one room; empty if the room does not exist.
    pub fn members_of(&self, room: &RoomName) -> BTreeSet<Nick> {
        self.state.read().members_of(room)
    }

    /// Every nick in at least one room.
    pub fn online_users(&self) -> BTreeSet<Nick> {
        self.state.read().online()
    }

    /// Whether `nick` is in at least one room.
    pub fn is_online(&self, nick: &Nick) -> bool {
        self.state.read().is_online(nick)
    }

    /// Current counts plus cumulative metrics.
    pub fn stats(&self) -> RegistryStats {
        let state = self.state.read();
        RegistryStats {
            rooms: state.room_count(),
            online: state.online_count(),
            memberships: state.edge_count(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Verifies that no room is empty and that presence matches membership.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.state.read().validate()
    }

    /// Subscribes to membership events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.events.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn connect_at(
        &self,
        rooms: &BTreeSet<RoomName>,
        nick: &Nick,
        now: DateTime<Utc>,
    ) {
        self.apply_join(rooms, nick, Some(now));
    }

    #[cfg(test)]
    pub(crate) fn touch_at(&self, nick: &Nick, now: DateTime<Utc>) -> bool {
        self.state.write().touch(nick, now)
    }

    // Timestamps are taken under the write lock so last_seen and event
    // times never run backwards relative to the order of operations.
    fn apply_join(&self, rooms: &BTreeSet<RoomName>, nick: &Nick, at: Option<DateTime<Utc>>) {
        let mut state = self.state.write();
        let now = at.unwrap_or_else(Utc::now);
        let outcome = state.join(nick, rooms, now);
        if outcome.is_empty() {
            return;
        }
        let JoinOutcome { joined, opened } = outcome;

        tracing::debug!(
            nick = %nick,
            joined = joined.len(),
            opened = opened.len(),
            "Nick joined rooms"
        );
        self.metrics.record_join(opened.len());
        self.publish(MembershipEvent::Joined {
            nick: nick.clone(),
            rooms: joined,
            opened,
            timestamp: now,
        });
    }

    fn apply_leave<F>(&self, nick: &Nick, reason: LeaveReason, op: F)
    where
        F: FnOnce(&mut MembershipState) -> LeaveOutcome,
    {
        let mut state = self.state.write();
        let now = Utc::now();
        let outcome = op(&mut *state);
        self.publish_leave(nick, outcome, reason, now);
    }

    // Caller holds the write lock.
    fn publish_leave(
        &self,
        nick: &Nick,
        outcome: LeaveOutcome,
        reason: LeaveReason,
        now: DateTime<Utc>,
    ) {
        if outcome.is_empty() {
            return;
        }
        let LeaveOutcome { left, closed } = outcome;

        match reason {
            LeaveReason::Expired => {
                tracing::info!(nick = %nick, rooms = left.len(), "Idle nick expired")
            }
            _ => tracing::debug!(
                nick = %nick,
                left = left.len(),
                closed = closed.len(),
                "Nick left rooms"
            ),
        }
        self.metrics
            .record_leave(closed.len(), reason == LeaveReason::Expired);
        self.publish(MembershipEvent::Left {
            nick: nick.clone(),
            rooms: left,
            closed,
            reason,
            timestamp: now,
        });
    }

    fn publish(&self, event: MembershipEvent) {
        // No receivers is not an error.
        if self.events.send(event).is_ok() {
            self.metrics.record_event();
        }
    }
}

impl Default for MembershipRegistry {
    fn default() -> Self {
        Self::from_config(&PresenceConfig::default())
    }
}
