//! Debounced interval: schedules `f` such that invocations never overlap.
//! The next tick is scheduled `interval` after the *previous completion*,
//! not on a fixed wall-clock cadence — this is what keeps `FetchTask`,
//! `EligibilityTask`, and the DRTask refresh loop from piling up work when a
//! single tick runs long.

use std::{future::Future, time::Duration};

use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

/// Spawns a task that repeatedly awaits `f()`, sleeping `interval` after
/// each completion, until `cancel` fires. Returns the task handle so the
/// caller can join it at shutdown.
pub fn spawn_debounced_interval<F, Fut>(
    interval: Duration,
    cancel: CancellationToken,
    mut f: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = f() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

    #[tokio::test]
    async fn ticks_stop_on_cancel() {
        let cancel = CancellationToken::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();

        let handle = spawn_debounced_interval(Duration::from_millis(5), cancel.clone(), move || {
            let count = count2.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(25)).await;
        cancel.cancel();
        let _ = handle.await;

        assert!(count.load(Ordering::SeqCst) >= 1);
    }
}
