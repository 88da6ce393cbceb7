use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Whole-second recording timer.
///
/// Reset to zero by [`start`](Self::start), advanced once per second by a
/// background task, frozen by [`stop`](Self::stop).
#[derive(Debug, Default)]
pub struct ElapsedTimer {
    seconds: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl ElapsedTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to 0 and start ticking. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        self.start_until(std::future::pending::<()>());
    }

    /// Like [`start`](Self::start), but the counter also freezes on its own
    /// once `until` completes.
    pub fn start_until<F>(&mut self, until: F)
    where
        F: Future + Send + 'static,
    {
        self.stop();
        self.seconds.store(0, Ordering::Relaxed);

        let seconds = Arc::clone(&self.seconds);
        let started = Instant::now();
        self.task = Some(tokio::spawn(async move {
            let mut ticks = interval_at(started + TICK, TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tokio::pin!(until);
            loop {
                tokio::select! {
                    _ = &mut until => break,
                    _ = ticks.tick() => {
                        // Derived from the start instant so a delayed tick never loses a second
                        seconds.fetch_max(started.elapsed().as_secs(), Ordering::Relaxed);
                    }
                }
            }
        }));
    }

    /// Freeze the counter at its current value
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn seconds(&self) -> u64 {
        self.seconds.load(Ordering::Relaxed)
    }

    /// Counter rendered as `MM:SS`
    pub fn display(&self) -> String {
        format_elapsed(self.seconds())
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Formats whole seconds as zero-padded `MM:SS`; minutes are not wrapped into hours.
pub fn format_elapsed(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(7), "00:07");
        assert_eq!(format_elapsed(65), "01:05");
        assert_eq!(format_elapsed(3600), "60:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_second_and_freezes() {
        let mut timer = ElapsedTimer::new();
        timer.start();
        assert_eq!(timer.seconds(), 0);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(timer.seconds(), 3);
        assert_eq!(timer.display(), "00:03");

        timer.stop();
        assert!(!timer.is_running());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(timer.seconds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_counter() {
        let mut timer = ElapsedTimer::new();
        timer.start();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(timer.seconds(), 2);

        timer.start();
        assert_eq!(timer.seconds(), 0);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(timer.seconds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_freezes_when_until_completes() {
        let (done, until) = tokio::sync::oneshot::channel::<()>();
        let mut timer = ElapsedTimer::new();
        timer.start_until(until);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        done.send(()).unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(timer.seconds(), 2);
    }
}
