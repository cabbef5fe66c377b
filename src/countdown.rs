use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source. Swapped for [`ManualClock`] in tests.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed_us: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed_us
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.elapsed_us.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// The displayed value changed to this number.
    Tick(u32),
    /// Zero reached; the photo should be taken now.
    Finished,
}

/// A 3-2-1 style countdown measured against a [`Clock`].
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: u32,
    interval: Duration,
    next_step_at: Duration,
    finished: bool,
}

impl Countdown {
    pub fn start(seconds: u32, interval: Duration, now: Duration) -> Self {
        Self {
            remaining: seconds.max(1),
            interval,
            next_step_at: now + interval,
            finished: false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Moves at most one step per call so a late poll still shows every value.
    pub fn poll(&mut self, now: Duration) -> Option<CountdownEvent> {
        if self.finished || now < self.next_step_at {
            return None;
        }

        self.remaining -= 1;
        self.next_step_at += self.interval;
        if self.remaining == 0 {
            self.finished = true;
            Some(CountdownEvent::Finished)
        } else {
            Some(CountdownEvent::Tick(self.remaining))
        }
    }
}
