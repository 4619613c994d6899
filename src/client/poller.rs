//! Repeating fetch tasks with explicit release.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::{Instant, MissedTickBehavior};

/// Handle to a running poll task.
///
/// Dropping the handle (or calling [`PollHandle::stop`]) stops further ticks.
/// A fetch already in flight is left to finish.
pub struct PollHandle {
    name: String,
    stop_tx: broadcast::Sender<()>,
}

impl PollHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stop(self) {}
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        tracing::debug!("Poller: Stopped {}", self.name);
    }
}

/// Run `task` once now, then every `period` until the handle is released.
///
/// With no period the task runs exactly once. A tick that fires while the
/// previous fetch is still running is skipped, not queued.
pub fn spawn_poll<F, Fut>(name: &str, period: Option<Duration>, task: F) -> PollHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, mut stop_rx) = broadcast::channel(1);
    let task_name = name.to_string();

    tokio::spawn(async move {
        // One permit: at most one fetch of this task in flight.
        let in_flight = Arc::new(Semaphore::new(1));

        run_tick(&task_name, &in_flight, &task);

        let Some(period) = period else {
            tracing::debug!("Poller: {} polling disabled, fetched once", task_name);
            return;
        };

        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.recv() => {
                    break;
                }
                _ = interval.tick() => {
                    run_tick(&task_name, &in_flight, &task);
                }
            }
        }
    });

    tracing::debug!("Poller: Started {} (period {:?})", name, period);

    PollHandle {
        name: name.to_string(),
        stop_tx,
    }
}

fn run_tick<F, Fut>(name: &str, in_flight: &Arc<Semaphore>, task: &F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let permit = match in_flight.clone().try_acquire_owned() {
        Ok(p) => p,
        Err(_) => {
            tracing::warn!("Poller: Skipping {} tick, previous fetch still running", name);
            return false;
        }
    };

    let fetch = task();
    tokio::spawn(async move {
        let _permit = permit; // Hold permit until done
        fetch.await;
    });

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(count: &Arc<AtomicUsize>, work: Duration) -> impl Fn() -> futures::future::BoxFuture<'static, ()> {
        let count = count.clone();
        move || {
            let count = count.clone();
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
                if !work.is_zero() {
                    tokio::time::sleep(work).await;
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeats_every_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = spawn_poll("queues", Some(Duration::from_secs(10)), counting(&count, Duration::ZERO));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_polling_fetches_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = spawn_poll("metrics", None, counting(&count, Duration::ZERO));

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_stops_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = spawn_poll("queues", Some(Duration::from_secs(10)), counting(&count, Duration::ZERO));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_tick_skipped() {
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = spawn_poll(
            "metrics",
            Some(Duration::from_secs(10)),
            counting(&count, Duration::from_secs(25)),
        );

        // Fetch started at 0s holds the guard until 25s; ticks at 10s and 20s are skipped.
        tokio::time::sleep(Duration::from_secs(22)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(13)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
