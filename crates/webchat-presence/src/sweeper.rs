//! Idle presence sweeper. Disconnects nicks that stopped sending heartbeats.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time;
use tracing;

use webchat_core::config::presence::PresenceConfig;
use webchat_core::types::Nick;

use crate::registry::MembershipRegistry;

/// Periodically expires nicks idle for longer than the timeout.
#[derive(Debug)]
pub struct PresenceSweeper {
    registry: Arc<MembershipRegistry>,
    idle_timeout: Duration,
    interval: Duration,
}

impl PresenceSweeper {
    /// Create a sweeper with explicit timings.
    pub fn new(
        registry: Arc<MembershipRegistry>,
        idle_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            idle_timeout,
            interval,
        }
    }

    /// Create a sweeper from configuration, or `None` when expiry is disabled.
    pub fn from_config(
        registry: Arc<MembershipRegistry>,
        config: &PresenceConfig,
    ) -> Option<Self> {
        config
            .idle_timeout()
            .map(|timeout| Self::new(registry, timeout, config.sweep_interval()))
    }

    /// Run a single sweep, returning the expired nicks.
    pub fn sweep_once(&self) -> Vec<Nick> {
        let timeout =
            chrono::Duration::from_std(self.idle_timeout).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(timeout)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let expired = self.registry.expire_idle(cutoff);
        if !expired.is_empty() {
            tracing::info!("Presence sweep expired {} idle nick(s)", expired.len());
        }
        expired
    }

    /// Sweep on every interval tick until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Presence sweeper started (idle_timeout={}s, interval={}s)",
            self.idle_timeout.as_secs(),
            self.interval.as_secs()
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Presence sweeper received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep_once();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use webchat_core::types::RoomName;

    fn registry_with(nicks: &[&str]) -> Arc<MembershipRegistry> {
        let registry = Arc::new(MembershipRegistry::default());
        for n in nicks {
            registry.connect(
                [RoomName::parse("general").unwrap()],
                &Nick::parse(n).unwrap(),
            );
        }
        registry
    }

    #[test]
    fn test_disabled_by_config() {
        let config = PresenceConfig {
            idle_timeout_seconds: 0,
            ..PresenceConfig::default()
        };
        assert!(PresenceSweeper::from_config(registry_with(&[]), &config).is_none());
    }

    #[test]
    fn test_zero_timeout_expires_everyone() {
        let registry = registry_with(&["alice", "bob"]);
        let sweeper = PresenceSweeper::new(
            Arc::clone(&registry),
            Duration::ZERO,
            Duration::from_secs(1),
        );

        std::thread::sleep(Duration::from_millis(5));
        let expired = sweeper.sweep_once();
        assert_eq!(expired.len(), 2);
        assert!(registry.list_rooms().is_empty());
    }

    #[test]
    fn test_fresh_nicks_survive() {
        let registry = registry_with(&["alice"]);
        let sweeper = PresenceSweeper::new(
            Arc::clone(&registry),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );

        assert!(sweeper.sweep_once().is_empty());
        assert_eq!(registry.online_users().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let registry = registry_with(&["alice"]);
        let sweeper = PresenceSweeper::new(
            Arc::clone(&registry),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sweeper.run(rx));
        time::sleep(Duration::from_secs(3)).await;
        tx.send(true).unwrap();

        handle.await.unwrap();
        assert!(registry.is_online(&Nick::parse("alice").unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_expires_idle_nick_on_tick() {
        let registry = Arc::new(MembershipRegistry::default());
        let general = std::collections::BTreeSet::from([RoomName::parse("general").unwrap()]);
        let stale = Nick::parse("alice").unwrap();
        let fresh = Nick::parse("bob").unwrap();
        registry.connect_at(&general, &stale, Utc::now() - chrono::Duration::seconds(120));
        registry.connect_at(&general, &fresh, Utc::now());

        let sweeper = PresenceSweeper::new(
            Arc::clone(&registry),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sweeper.run(rx));
        time::sleep(Duration::from_secs(2)).await;

        assert!(!registry.is_online(&stale));
        assert!(registry.is_online(&fresh));
        assert_eq!(registry.stats().metrics.expirations, 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
