// src/engine/timer.rs

use std::{sync::Weak, time::Duration};

use async_trait::async_trait;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

/// Receiver of the countdown of one question.
#[async_trait]
pub trait TimerTarget: Send + Sync + 'static {
    /// Called once per elapsed period. Returns the seconds left on `index`,
    /// or `None` when that question is no longer being answered.
    async fn tick(&self, index: usize) -> Option<u64>;

    /// Called once when the countdown of `index` reaches zero.
    async fn expire(&self, index: usize);
}

/// Background countdown for a single question.
///
/// Dropping the timer aborts the task, so a timer that outlives its question
/// can never fire a late submission.
#[derive(Debug)]
pub struct QuestionTimer {
    handle: Option<JoinHandle<()>>,
}

impl QuestionTimer {
    pub fn start<T: TimerTarget>(target: Weak<T>, index: usize, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let Some(target) = target.upgrade() else {
                    break;
                };
                match target.tick(index).await {
                    Some(0) => {
                        tracing::debug!(question = index, "question timer expired");
                        target.expire(index).await;
                        break;
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    /// Lets the task run to completion instead of aborting it on drop.
    /// Used by the task itself once it has committed to firing.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    };

    use super::*;

    struct Countdown {
        remaining: AtomicU64,
        expired: AtomicUsize,
    }

    #[async_trait]
    impl TimerTarget for Countdown {
        async fn tick(&self, _index: usize) -> Option<u64> {
            let left = self.remaining.load(Ordering::SeqCst).saturating_sub(1);
            self.remaining.store(left, Ordering::SeqCst);
            Some(left)
        }

        async fn expire(&self, _index: usize) {
            self.expired.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn countdown(seconds: u64) -> Arc<Countdown> {
        Arc::new(Countdown {
            remaining: AtomicU64::new(seconds),
            expired: AtomicUsize::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_zero() {
        let target = countdown(3);
        let _timer = QuestionTimer::start(Arc::downgrade(&target), 0, Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(target.remaining.load(Ordering::SeqCst), 1);
        assert_eq!(target.expired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(target.remaining.load(Ordering::SeqCst), 0);
        assert_eq!(target.expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_stops_it() {
        let target = countdown(3);
        let timer = QuestionTimer::start(Arc::downgrade(&target), 0, Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(timer);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(target.remaining.load(Ordering::SeqCst), 2);
        assert_eq!(target.expired.load(Ordering::SeqCst), 0);
    }
}
