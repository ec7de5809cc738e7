//! Session reaper: evicts sessions idle for longer than the timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::SessionDirectory;

pub struct SessionReaper {
    sessions: Arc<SessionDirectory>,
    timeout: Duration,
    interval: Duration,
}

impl SessionReaper {
    pub fn new(sessions: Arc<SessionDirectory>, timeout: Duration, interval: Duration) -> Self {
        Self {
            sessions,
            timeout,
            interval,
        }
    }

    /// Remove every session whose last access is strictly older than
    /// `now - timeout`. Returns the removed scene ids.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        // a timeout reaching past the representable range evicts nothing
        let Some(cutoff) = chrono::Duration::from_std(self.timeout)
            .ok()
            .and_then(|timeout| now.checked_sub_signed(timeout))
        else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        for (scene_id, last_access) in self.sessions.snapshot() {
            if last_access >= cutoff {
                continue;
            }
            if self.sessions.remove_if_idle(&scene_id, cutoff) {
                tracing::info!(
                    session_id = %scene_id,
                    "Session {} automatically removed due to timeout",
                    scene_id
                );
                removed.push(scene_id);
            }
        }
        removed
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
                self.sweep(self.sessions.now());
            }
            tracing::debug!("Session reaper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::{ClockPort, InMemoryDirectory};
    use chrono::TimeZone;
    use mmi_domain::SessionId;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_stale_session_evicted_fresh_survives() {
        let clock = Arc::new(ManualClock::new(start()));
        let sessions = Arc::new(SessionDirectory::new(
            clock.clone(),
            Arc::new(InMemoryDirectory::new()),
        ));
        sessions.create(&SessionId::parse("stale").unwrap()).unwrap();

        clock.advance(chrono::Duration::seconds(61));
        let fresh = sessions.create(&SessionId::parse("fresh").unwrap()).unwrap();
        sessions.touch(&fresh);

        let reaper = SessionReaper::new(
            sessions.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        let removed = reaper.sweep(clock.now());
        assert_eq!(removed, vec!["stale".to_string()]);
        assert!(sessions.get(&SessionId::parse("fresh").unwrap()).is_ok());
        assert!(sessions.get(&SessionId::parse("stale").unwrap()).is_err());
    }

    #[test]
    fn test_exactly_at_timeout_survives() {
        let clock = Arc::new(ManualClock::new(start()));
        let sessions = Arc::new(SessionDirectory::new(
            clock.clone(),
            Arc::new(InMemoryDirectory::new()),
        ));
        sessions.create(&SessionId::parse("edge").unwrap()).unwrap();

        let reaper = SessionReaper::new(sessions.clone(), Duration::from_secs(60), Duration::ZERO);
        assert!(reaper
            .sweep(start() + chrono::Duration::seconds(60))
            .is_empty());
        assert_eq!(
            reaper.sweep(start() + chrono::Duration::seconds(61)),
            vec!["edge".to_string()]
        );
    }

    #[test]
    fn test_timeout_beyond_calendar_range_keeps_sessions() {
        let clock = Arc::new(ManualClock::new(start()));
        let sessions = Arc::new(SessionDirectory::new(
            clock.clone(),
            Arc::new(InMemoryDirectory::new()),
        ));
        sessions.create(&SessionId::parse("old").unwrap()).unwrap();

        let reaper = SessionReaper::new(
            sessions.clone(),
            Duration::from_secs(10_000_000_000_000),
            Duration::from_secs(60),
        );
        assert!(reaper.sweep(clock.now()).is_empty());
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_reaper_stops_on_cancel() {
        let sessions = Arc::new(SessionDirectory::new(
            Arc::new(ManualClock::new(start())),
            Arc::new(InMemoryDirectory::new()),
        ));
        let reaper = Arc::new(SessionReaper::new(
            sessions,
            Duration::from_secs(1),
            Duration::from_millis(5),
        ));
        let cancel = CancellationToken::new();
        let handle = reaper.spawn(cancel.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
