//! Join requests, the set of rooms a nick enters on connect.

use std::collections::BTreeSet;

use webchat_core::config::presence::PresenceConfig;
use webchat_core::types::{Nick, RoomName};
use webchat_core::AppResult;

/// "This nick is now present in exactly these rooms" for one connect event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// The connecting nick.
    pub nick: Nick,
    /// Rooms to join. May be empty.
    pub rooms: BTreeSet<RoomName>,
}

impl JoinRequest {
    /// Build a request from already-validated names.
    pub fn new(nick: Nick, rooms: impl IntoIterator<Item = RoomName>) -> Self {
        Self {
            nick,
            rooms: rooms.into_iter().collect(),
        }
    }

    /// Parse a whitespace-separated room list as typed by a user.
    ///
    /// Duplicates collapse. An input naming no rooms targets
    /// `default_room`. Any invalid room name fails the whole request.
    pub fn parse(nick: Nick, input: &str, default_room: &RoomName) -> AppResult<Self> {
        let mut rooms = input
            .split_whitespace()
            .map(RoomName::parse)
            .collect::<AppResult<BTreeSet<_>>>()?;

        if rooms.is_empty() {
            rooms.insert(default_room.clone());
        }

        Ok(Self { nick, rooms })
    }

    /// Parse a room list, falling back to the configured default room.
    pub fn parse_with_config(nick: Nick, input: &str, config: &PresenceConfig) -> AppResult<Self> {
        let default_room = config.default_room()?;
        Self::parse(nick, input, &default_room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webchat_core::error::ErrorKind;

    fn global() -> RoomName {
        RoomName::parse("global").unwrap()
    }

    #[test]
    fn test_parse_dedupes() {
        let nick = Nick::parse("alice").unwrap();
        let req = JoinRequest::parse(nick, " dev general  dev\tgeneral ", &global()).unwrap();
        let names: Vec<&str> = req.rooms.iter().map(RoomName::as_str).collect();
        assert_eq!(names, vec!["dev", "general"]);
    }

    #[test]
    fn test_parse_empty_uses_default_room() {
        let nick = Nick::parse("alice").unwrap();
        let req = JoinRequest::parse(nick, "   ", &global()).unwrap();
        assert_eq!(req.rooms, BTreeSet::from([global()]));
    }

    #[test]
    fn test_parse_rejects_invalid_room() {
        let nick = Nick::parse("alice").unwrap();
        let too_long = "r".repeat(webchat_core::types::MAX_NAME_LEN + 1);
        let err = JoinRequest::parse(nick, &format!("dev {too_long}"), &global()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_parse_with_config_uses_configured_room() {
        let config = PresenceConfig {
            default_room: "lobby".to_string(),
            ..PresenceConfig::default()
        };
        let req = JoinRequest::parse_with_config(Nick::parse("alice").unwrap(), "", &config).unwrap();
        assert_eq!(req.rooms, BTreeSet::from([RoomName::parse("lobby").unwrap()]));
    }

    #[test]
    fn test_parse_with_config_rejects_bad_default() {
        let config = PresenceConfig {
            default_room: "not valid".to_string(),
            ..PresenceConfig::default()
        };
        let err =
            JoinRequest::parse_with_config(Nick::parse("alice").unwrap(), "", &config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_new_allows_empty() {
        let req = JoinRequest::new(Nick::parse("alice").unwrap(), Vec::new());
        assert!(req.rooms.is_empty());
    }
}
