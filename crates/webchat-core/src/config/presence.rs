//! Membership registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::RoomName;

/// Presence and room membership settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Room joined when a join request names no rooms.
    #[serde(default = "default_room")]
    pub default_room: String,
    /// Buffer size of the membership event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
    /// Seconds without a heartbeat before a nick is disconnected.
    /// `0` disables expiry.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Interval between idle sweeps, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl PresenceConfig {
    /// The configured default room as a validated name.
    pub fn default_room(&self) -> AppResult<RoomName> {
        RoomName::parse(&self.default_room).map_err(|e| {
            AppError::configuration(format!(
                "presence.default_room '{}' is invalid: {}",
                self.default_room, e.message
            ))
        })
    }

    /// Idle timeout, or `None` when expiry is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }

    /// Sweep interval, clamped to at least one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            default_room: default_room(),
            event_buffer_size: default_event_buffer(),
            idle_timeout_seconds: default_idle_timeout(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_room() -> String {
    "global".to_string()
}

fn default_event_buffer() -> usize {
    256
}

fn default_idle_timeout() -> u64 {
    90
}

fn default_sweep_interval() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_zero_timeout_disables_expiry() {
        let config = PresenceConfig {
            idle_timeout_seconds: 0,
            ..PresenceConfig::default()
        };
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn test_default_room_resolves() {
        let room = PresenceConfig::default().default_room().unwrap();
        assert_eq!(room.as_str(), "global");
    }

    #[test]
    fn test_invalid_default_room_rejected() {
        let too_long = "x".repeat(crate::types::MAX_NAME_LEN + 1);
        for bad in ["", "   ", "two words", too_long.as_str()] {
            let config = PresenceConfig {
                default_room: bad.to_string(),
                ..PresenceConfig::default()
            };
            let err = config.default_room().unwrap_err();
            assert_eq!(err.kind, ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_sweep_interval_clamped() {
        let config = PresenceConfig {
            sweep_interval_seconds: 0,
            ..PresenceConfig::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
