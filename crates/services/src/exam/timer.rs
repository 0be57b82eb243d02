use std::time::Duration;

use exam_core::timing::LOW_TIME_WARNING_SECS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// Cadence of countdown ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Signals produced by the exam countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed; `remaining` is the new value.
    Tick { remaining: u32 },
    /// Remaining time reached the warning threshold. Fires at most once.
    LowTime,
    /// Remaining time reached zero. Fires at most once and is always last.
    Expired,
}

/// Pure countdown state, advanced one second per `tick`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    total: u32,
    remaining: u32,
    warned: bool,
    expired: bool,
}

impl Countdown {
    #[must_use]
    pub fn new(total_secs: u32) -> Self {
        Self {
            total: total_secs,
            remaining: total_secs,
            warned: false,
            expired: false,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn has_warned(&self) -> bool {
        self.warned
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Advance by one second and return the resulting events in order.
    ///
    /// Once expired, further ticks return nothing.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        if self.expired {
            return Vec::new();
        }

        self.remaining = self.remaining.saturating_sub(1);
        let mut events = vec![TimerEvent::Tick {
            remaining: self.remaining,
        }];

        if self.remaining == LOW_TIME_WARNING_SECS && !self.warned {
            self.warned = true;
            events.push(TimerEvent::LowTime);
        }
        if self.remaining == 0 {
            self.expired = true;
            events.push(TimerEvent::Expired);
        }
        events
    }
}

/// Owns the spawned countdown task.
///
/// The task is aborted on `cancel` and when the handle is dropped, so a
/// session that stops holding its handle never leaks a ticking timer.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop ticking. Safe to call more than once.
    pub fn cancel(&self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns countdowns on the current tokio runtime.
pub struct ExamTimer;

impl ExamTimer {
    /// Start counting down from `duration_secs`, one event batch per second.
    ///
    /// The receiver closes after `Expired` or once the handle is cancelled.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(duration_secs: u32) -> (TimerHandle, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut countdown = Countdown::new(duration_secs);
            let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            while !countdown.is_expired() {
                interval.tick().await;
                for event in countdown.tick() {
                    if tx.send(event).is_err() {
                        tracing::debug!("timer receiver dropped, stopping countdown");
                        return;
                    }
                }
            }
        });
        (TimerHandle { task }, rx)
    }
}
