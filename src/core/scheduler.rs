//! Periodic refresh scheduler.
//!
//! A restartable timer that invokes a caller-supplied callback on a fixed
//! interval. Each scheduler owns at most one timer task: `start` always
//! aborts the previous task before spawning a new one.
//!
//! State machine:
//! - Stopped -> Running via `start`
//! - Running -> Stopped via `stop`
//! - Running -> Running via `update_interval` (same task, new period)
//! - Running -> Running via `start` (old task aborted, new task spawned)

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};

use crate::error::{InsightError, Result};

/// Smallest period the scheduler will run at.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Callback invoked on every tick. Errors are logged; the schedule continues.
pub type RefreshCallback = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a `RefreshCallback`.
pub fn refresh_callback<F, Fut>(f: F) -> RefreshCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Refresh period as configured in whole seconds; zero means disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshInterval {
    Disabled,
    Every(Duration),
}

impl RefreshInterval {
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::Disabled
        } else {
            Self::Every(Duration::from_secs(secs).max(MIN_INTERVAL))
        }
    }

    #[must_use]
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Every(d) => Some(d),
        }
    }
}

struct RunningSchedule {
    handle: JoinHandle<()>,
    interval_tx: watch::Sender<Duration>,
}

/// Owns the single refresh timer of a connection.
#[derive(Default)]
pub struct RefreshScheduler {
    running: Option<RunningSchedule>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("running", &self.is_running())
            .field("interval", &self.interval())
            .finish()
    }
}

impl RefreshScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval`, replacing any running schedule.
    ///
    /// The first invocation happens one interval after the call.
    ///
    /// # Errors
    /// Returns an error when called outside a tokio runtime.
    pub fn start(&mut self, interval: Duration, callback: RefreshCallback) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| InsightError::Other(anyhow::anyhow!("refresh scheduler needs a tokio runtime: {e}")))?;

        self.stop();

        let interval = clamp(interval);
        let (interval_tx, interval_rx) = watch::channel(interval);
        let handle = runtime.spawn(run_schedule(Instant::now(), interval_rx, callback));

        self.running = Some(RunningSchedule {
            handle,
            interval_tx,
        });
        tracing::info!(interval_secs = interval.as_secs_f64(), "Auto refresh started");
        Ok(())
    }

    /// Stop the running schedule. Safe to call when stopped.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
            tracing::info!("Auto refresh stopped");
        }
    }

    /// Change the period of the live timer without restarting it.
    ///
    /// The next tick is re-armed relative to the previous one. No effect when
    /// stopped.
    pub fn update_interval(&mut self, interval: Duration) {
        let Some(running) = &self.running else {
            tracing::debug!("Ignoring interval update while stopped");
            return;
        };
        let interval = clamp(interval);
        if running.interval_tx.send(interval).is_ok() {
            tracing::info!(interval_secs = interval.as_secs_f64(), "Auto refresh interval updated");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Current period, if running.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.running
            .as_ref()
            .map(|running| *running.interval_tx.borrow())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn clamp(interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        tracing::debug!(requested_ms = interval.as_millis(), "Clamping refresh interval to minimum");
        MIN_INTERVAL
    } else {
        interval
    }
}

async fn run_schedule(
    started: Instant,
    mut interval_rx: watch::Receiver<Duration>,
    callback: RefreshCallback,
) {
    let mut interval = *interval_rx.borrow_and_update();
    let mut last_tick = started;

    loop {
        let deadline = last_tick + interval;
        tokio::select! {
            () = sleep_until(deadline) => {
                last_tick = deadline;
                invoke(&callback).await;
                // A callback that overran the period delays the schedule
                // instead of bursting to catch up.
                let now = Instant::now();
                if now > last_tick + interval {
                    last_tick = now;
                }
            }
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                interval = *interval_rx.borrow_and_update();
            }
        }
    }
}

async fn invoke(callback: &RefreshCallback) {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| callback())) {
        Ok(future) => future,
        Err(panic) => {
            tracing::error!(panic = %panic_message(panic.as_ref()), "Refresh callback panicked");
            return;
        }
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => tracing::trace!("Refresh tick completed"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Refresh callback failed"),
        Err(panic) => {
            tracing::error!(panic = %panic_message(panic.as_ref()), "Refresh callback panicked");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::sleep;

    fn counting_callback() -> (RefreshCallback, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let callback = refresh_callback(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (callback, count)
    }

    #[test]
    fn interval_from_secs() {
        assert_eq!(RefreshInterval::from_secs(0), RefreshInterval::Disabled);
        assert_eq!(
            RefreshInterval::from_secs(300).duration(),
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        let (callback, _) = counting_callback();
        let mut scheduler = RefreshScheduler::new();
        assert!(scheduler.start(Duration::from_secs(1), callback).is_err());
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_interval() {
        let (callback, count) = counting_callback();
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_secs(1), callback).unwrap();

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_ticks() {
        let (callback, count) = counting_callback();
        let mut scheduler = RefreshScheduler::new();
        scheduler.stop();
        scheduler.start(Duration::from_secs(1), callback).unwrap();

        sleep(Duration::from_millis(1500)).await;
        scheduler.stop();
        scheduler.stop();
        sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());
        assert!(scheduler.interval().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_interval_is_clamped() {
        let (callback, count) = counting_callback();
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_millis(10), callback).unwrap();
        assert_eq!(scheduler.interval(), Some(MIN_INTERVAL));

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_timer() {
        let (callback, count) = counting_callback();
        let mut scheduler = RefreshScheduler::new();
        scheduler
            .start(Duration::from_secs(1), Arc::clone(&callback))
            .unwrap();
        scheduler.start(Duration::from_secs(1), callback).unwrap();

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_rearms_from_restart_time() {
        let (callback, count) = counting_callback();
        let mut scheduler = RefreshScheduler::new();
        scheduler
            .start(Duration::from_secs(3), Arc::clone(&callback))
            .unwrap();

        sleep(Duration::from_secs(2)).await;
        scheduler.start(Duration::from_secs(2), callback).unwrap();

        // Old timer would have fired at 3s; the new one fires at 4s and 6s.
        sleep(Duration::from_millis(4500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_and_panicking_callbacks_do_not_stop_schedule() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let callback = refresh_callback(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => anyhow::bail!("server unreachable"),
                    1 => panic!("renderer exploded"),
                    _ => Ok(()),
                }
            }
        });

        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_secs(1), callback).unwrap();

        sleep(Duration::from_millis(4500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn update_interval_changes_live_timer() {
        let (callback, count) = counting_callback();
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(Duration::from_secs(2), callback).unwrap();

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.update_interval(Duration::from_secs(1));
        assert_eq!(scheduler.interval(), Some(Duration::from_secs(1)));

        // Re-armed from the tick at 2s: fires at 3s, 4s, 5s.
        sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn update_interval_while_stopped_is_ignored() {
        let mut scheduler = RefreshScheduler::new();
        scheduler.update_interval(Duration::from_secs(5));
        assert!(!scheduler.is_running());
        assert!(scheduler.interval().is_none());
    }

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
