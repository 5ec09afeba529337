use std::time::Duration;

use tokio::sync::watch;

use crate::state::SharedState;

/// Periodically drops expired cache entries and stale login-failure counters.
/// Returns once shutdown is signaled.
pub async fn run_housekeeping(
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::debug!("Housekeeping started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.cache.provider().purge_expired();
                state.auth.login_limiter().cleanup();
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Housekeeping stopped");
}
