use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// What the renewal loop does after a completed chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Sleep this many seconds, then run the chain again
    Repeat(u64),
    Terminate,
}

/// Renew at half the target session's lifetime.
pub fn next_action(renew: bool, target_duration_seconds: i32) -> NextAction {
    if !renew {
        return NextAction::Terminate;
    }

    NextAction::Repeat(u64::try_from(target_duration_seconds / 2).unwrap_or(0))
}

/// Sleep for `seconds` unless `shutdown` fires first.
///
/// Returns `false` when the wait was cut short.
pub async fn wait(seconds: u64, shutdown: &CancellationToken) -> bool {
    info!("Next renewal in {} seconds", seconds);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => true,
        _ = shutdown.cancelled() => {
            info!("Shutdown requested during renewal wait");
            false
        }
    }
}
