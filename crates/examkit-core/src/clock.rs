//! Exam countdown clock.
//!
//! A 1 Hz countdown that delivers expiry as a one-shot event rather than a
//! value callers compare to zero — the expiry signal is the only time-based
//! trigger for submission, so there is nothing to poll and nothing to race.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Countdown clock for one attempt.
///
/// Ticks once per wall-clock second while started and not paused. On
/// reaching zero it sends the expiry signal exactly once and stops ticking.
#[derive(Debug)]
pub struct ExamClock {
    duration_seconds: u64,
    remaining: Arc<AtomicU64>,
    paused: Arc<AtomicBool>,
    expiry_rx: Option<oneshot::Receiver<()>>,
    tick_task: Option<JoinHandle<()>>,
}

impl ExamClock {
    /// A stopped clock with the full duration remaining.
    pub fn new(duration_seconds: u64) -> Self {
        Self {
            duration_seconds,
            remaining: Arc::new(AtomicU64::new(duration_seconds)),
            paused: Arc::new(AtomicBool::new(false)),
            expiry_rx: None,
            tick_task: None,
        }
    }

    /// Start ticking. Idempotent: a second call is a no-op.
    pub fn start(&mut self) {
        if self.tick_task.is_some() {
            return;
        }

        let (tx, rx) = oneshot::channel();
        self.expiry_rx = Some(rx);

        let remaining = Arc::clone(&self.remaining);
        let paused = Arc::clone(&self.paused);
        self.tick_task = Some(tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(
                tokio::time::Instant::now() + period,
                period,
            );
            loop {
                interval.tick().await;
                if paused.load(Ordering::Relaxed) {
                    continue;
                }
                let left = remaining.load(Ordering::Acquire).saturating_sub(1);
                remaining.store(left, Ordering::Release);
                if left == 0 {
                    // The task exits right after the send, so the signal
                    // cannot fire twice however many ticks were queued.
                    let _ = tx.send(());
                    return;
                }
            }
        }));
    }

    /// The configured total duration.
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// Seconds left on the countdown.
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Seconds consumed so far.
    pub fn elapsed_seconds(&self) -> u64 {
        self.duration_seconds - self.remaining_seconds()
    }

    /// Suspend ticking. Remaining time holds until `resume`.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    /// Resume ticking after a `pause`.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Take the expiry receiver. Yields `Some` once, after `start`; the
    /// holder awaits it (typically inside `select!`) to observe expiry.
    pub fn take_expiry(&mut self) -> Option<oneshot::Receiver<()>> {
        self.expiry_rx.take()
    }

    /// Stop ticking for good.
    pub fn stop(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
    }
}

impl Drop for ExamClock {
    fn drop(&mut self) {
        self.stop();
    }
}
