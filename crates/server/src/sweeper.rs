use std::sync::Arc;
use std::time::Duration;

use ordermate_core::ports::SessionStore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Periodically drops sessions idle past their TTL.
pub fn spawn(sessions: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sessions.sweep_expired().await {
                Ok(removed) => {
                    debug!(event_name = "system.sweeper.tick", removed, "session sweep finished")
                }
                Err(error) => warn!(
                    event_name = "system.sweeper.error",
                    error = %error,
                    "session sweep failed"
                ),
            }
        }
    })
}
