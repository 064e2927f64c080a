//! Membership state guarded by the registry lock.
//!
//! The forward index (room → members) and the reverse index
//! (nick → rooms) are always updated together. Global presence is the key
//! set of the reverse index, so a nick is online iff it sits in at least
//! one room.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use webchat_core::types::{Nick, RoomName};

/// Point-in-time copy of every room and its members.
pub type RoomMembership = BTreeMap<RoomName, BTreeSet<Nick>>;

/// A broken membership invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A room is mapped with no members.
    #[error("room '{0}' is mapped with no members")]
    EmptyRoom(RoomName),
    /// A room lists a nick that is not globally present.
    #[error("room '{room}' lists '{nick}' but the nick is not online")]
    MemberNotOnline {
        /// Room holding the member.
        room: RoomName,
        /// The member.
        nick: Nick,
    },
    /// A nick's room list disagrees with the room's member set.
    #[error("'{nick}' claims room '{room}' but is not among its members")]
    DanglingRoom {
        /// The online nick.
        nick: Nick,
        /// The room it claims.
        room: RoomName,
    },
    /// A nick is online without belonging to any room.
    #[error("'{0}' is online without any room")]
    OnlineWithoutRoom(Nick),
}

/// Per-nick presence record.
#[derive(Debug, Clone)]
struct Presence {
    rooms: HashSet<RoomName>,
    last_seen: DateTime<Utc>,
}

/// Rooms affected by a join.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct JoinOutcome {
    /// Rooms the nick was not already in.
    pub joined: Vec<RoomName>,
    /// Subset of `joined` that did not exist before.
    pub opened: Vec<RoomName>,
}

/// Rooms affected by a leave.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LeaveOutcome {
    /// Rooms the nick was actually removed from.
    pub left: Vec<RoomName>,
    /// Subset of `left` that became empty and was deleted.
    pub closed: Vec<RoomName>,
}

impl JoinOutcome {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }
}

impl LeaveOutcome {
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Room membership plus its reverse index.
#[derive(Debug, Default)]
pub(crate) struct MembershipState {
    rooms: HashMap<RoomName, HashSet<Nick>>,
    nicks: HashMap<Nick, Presence>,
}

impl MembershipState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `nick` to every room in `rooms`, creating rooms as needed.
    pub fn join(
        &mut self,
        nick: &Nick,
        rooms: &BTreeSet<RoomName>,
        now: DateTime<Utc>,
    ) -> JoinOutcome {
        let mut outcome = JoinOutcome::default();
        if rooms.is_empty() {
            return outcome;
        }

        let presence = self.nicks.entry(nick.clone()).or_insert_with(|| Presence {
            rooms: HashSet::new(),
            last_seen: now,
        });
        presence.last_seen = now;

        for room in rooms {
            if !presence.rooms.insert(room.clone()) {
                continue;
            }

            if !self.rooms.contains_key(room) {
                outcome.opened.push(room.clone());
            }
            self.rooms
                .entry(room.clone())
                .or_default()
                .insert(nick.clone());
            outcome.joined.push(room.clone());
        }

        outcome
    }

    /// Removes `nick` from each room in `rooms` it belongs to.
    pub fn leave<'a, I>(&mut self, nick: &Nick, rooms: I) -> LeaveOutcome
    where
        I: IntoIterator<Item = &'a RoomName>,
    {
        let mut outcome = LeaveOutcome::default();
        let Some(presence) = self.nicks.get_mut(nick) else {
            return outcome;
        };

        for room in rooms {
            if !presence.rooms.remove(room) {
                continue;
            }
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(nick);
                if members.is_empty() {
                    self.rooms.remove(room);
                    outcome.closed.push(room.clone());
                }
            }
            outcome.left.push(room.clone());
        }

        if presence.rooms.is_empty() {
            self.nicks.remove(nick);
        }

        outcome
    }

    /// Removes `nick` from every room it belongs to.
    pub fn leave_all(&mut self, nick: &Nick) -> LeaveOutcome {
        let mut rooms: Vec<RoomName> = match self.nicks.get(nick) {
            Some(presence) => presence.rooms.iter().cloned().collect(),
            None => return LeaveOutcome::default(),
        };
        rooms.sort();
        self.leave(nick, &rooms)
    }

    /// Refreshes the last activity time of an online nick.
    pub fn touch(&mut self, nick: &Nick, now: DateTime<Utc>) -> bool {
        match self.nicks.get_mut(nick) {
            Some(presence) => {
                presence.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Nicks whose last activity is strictly before `cutoff`, sorted.
    pub fn idle_since(&self, cutoff: DateTime<Utc>) -> Vec<Nick> {
        let mut idle: Vec<Nick> = self
            .nicks
            .iter()
            .filter(|(_, presence)| presence.last_seen < cutoff)
            .map(|(nick, _)| nick.clone())
            .collect();
        idle.sort();
        idle
    }

    pub fn membership(&self) -> RoomMembership {
        self.rooms
            .iter()
            .map(|(room, members)| (room.clone(), members.iter().cloned().collect()))
            .collect()
    }

    pub fn room_names(&self) -> BTreeSet<RoomName> {
        self.rooms.keys().cloned().collect()
    }

    pub fn rooms_of(&self, nick: &Nick) -> BTreeSet<RoomName> {
        self.nicks
            .get(nick)
            .map(|presence| presence.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn members_of(&self, room: &RoomName) -> BTreeSet<Nick> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn online(&self) -> BTreeSet<Nick> {
        self.nicks.keys().cloned().collect()
    }

    pub fn is_online(&self, nick: &Nick) -> bool {
        self.nicks.contains_key(nick)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn online_count(&self) -> usize {
        self.nicks.len()
    }

    /// Total number of (room, nick) membership edges.
    pub fn edge_count(&self) -> usize {
        self.rooms.values().map(HashSet::len).sum()
    }

    /// Checks that no room is empty and that both indexes agree.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for (room, members) in &self.rooms {
            if members.is_empty() {
                return Err(InvariantViolation::EmptyRoom(room.clone()));
            }
            for nick in members {
                let listed = self
                    .nicks
                    .get(nick)
                    .is_some_and(|presence| presence.rooms.contains(room));
                if !listed {
                    return Err(InvariantViolation::MemberNotOnline {
                        room: room.clone(),
                        nick: nick.clone(),
                    });
                }
            }
        }

        for (nick, presence) in &self.nicks {
            if presence.rooms.is_empty() {
                return Err(InvariantViolation::OnlineWithoutRoom(nick.clone()));
            }
            for room in &presence.rooms {
                let member = self
                    .rooms
                    .get(room)
                    .is_some_and(|members| members.contains(nick));
                if !member {
                    return Err(InvariantViolation::DanglingRoom {
                        nick: nick.clone(),
                        room: room.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nick(s: &str) -> Nick {
        Nick::parse(s).unwrap()
    }

    fn rooms(names: &[&str]) -> BTreeSet<RoomName> {
        names.iter().map(|n| RoomName::parse(n).unwrap()).collect()
    }

    #[test]
    fn test_join_reports_opened_rooms() {
        let mut state = MembershipState::new();
        let now = Utc::now();

        let first = state.join(&nick("alice"), &rooms(&["dev", "general"]), now);
        assert_eq!(first.joined, rooms(&["dev", "general"]).into_iter().collect::<Vec<_>>());
        assert_eq!(first.opened, first.joined);

        let second = state.join(&nick("bob"), &rooms(&["general"]), now);
        assert_eq!(second.joined.len(), 1);
        assert!(second.opened.is_empty());
        state.validate().unwrap();
    }

    #[test]
    fn test_rejoin_is_empty_outcome() {
        let mut state = MembershipState::new();
        let now = Utc::now();
        state.join(&nick("alice"), &rooms(&["general"]), now);

        let again = state.join(&nick("alice"), &rooms(&["general"]), now);
        assert!(again.is_empty());
        assert_eq!(state.edge_count(), 1);
    }

    #[test]
    fn test_empty_join_does_not_create_presence() {
        let mut state = MembershipState::new();
        let outcome = state.join(&nick("alice"), &BTreeSet::new(), Utc::now());
        assert!(outcome.is_empty());
        assert!(!state.is_online(&nick("alice")));
        state.validate().unwrap();
    }

    #[test]
    fn test_leave_closes_last_room() {
        let mut state = MembershipState::new();
        state.join(&nick("alice"), &rooms(&["general"]), Utc::now());

        let outcome = state.leave(&nick("alice"), &rooms(&["general"]));
        assert_eq!(outcome.left, outcome.closed);
        assert_eq!(state.room_count(), 0);
        assert_eq!(state.online_count(), 0);
        state.validate().unwrap();
    }

    #[test]
    fn test_partial_leave_keeps_presence() {
        let mut state = MembershipState::new();
        state.join(&nick("alice"), &rooms(&["dev", "general"]), Utc::now());

        state.leave(&nick("alice"), &rooms(&["dev"]));
        assert!(state.is_online(&nick("alice")));
        assert_eq!(state.rooms_of(&nick("alice")), rooms(&["general"]));
        state.validate().unwrap();
    }

    #[test]
    fn test_leave_unknown_is_noop() {
        let mut state = MembershipState::new();
        state.join(&nick("alice"), &rooms(&["general"]), Utc::now());

        assert!(state.leave(&nick("bob"), &rooms(&["general"])).is_empty());
        assert!(state.leave(&nick("alice"), &rooms(&["dev"])).is_empty());
        assert_eq!(state.members_of(&RoomName::parse("general").unwrap()).len(), 1);
    }

    #[test]
    fn test_idle_since_uses_last_seen() {
        let mut state = MembershipState::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(10);
        state.join(&nick("alice"), &rooms(&["general"]), t0);
        state.join(&nick("bob"), &rooms(&["general"]), t0);
        assert!(state.touch(&nick("bob"), t1));
        assert!(!state.touch(&nick("carol"), t1));

        let idle = state.idle_since(t0 + chrono::Duration::seconds(5));
        assert_eq!(idle, vec![nick("alice")]);
    }

    #[test]
    fn test_validate_detects_empty_room() {
        let mut state = MembershipState::new();
        state
            .rooms
            .insert(RoomName::parse("ghost").unwrap(), HashSet::new());
        assert!(matches!(
            state.validate(),
            Err(InvariantViolation::EmptyRoom(_))
        ));
    }

    #[test]
    fn test_validate_detects_index_mismatch() {
        let mut state = MembershipState::new();
        state.join(&nick("alice"), &rooms(&["general"]), Utc::now());
        state.nicks.clear();
        assert!(matches!(
            state.validate(),
            Err(InvariantViolation::MemberNotOnline { .. })
        ));
    }
}
