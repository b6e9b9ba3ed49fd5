//! Rate gates driven by an injectable clock.
//!
//! None of these own a timer: callers pass `now` in and poll for trailing
//! work from their own tick, which keeps them usable both from the tokio
//! event loop and from plain unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock, shared between clones
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Leading-edge limiter: lets a call through at most once per interval
#[derive(Debug)]
pub struct LeadingLimiter {
    interval: Duration,
    last: Option<Instant>,
}

impl LeadingLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true (and starts a new interval) if the call may proceed
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let open = self
            .last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if open {
            self.last = Some(now);
        }
        open
    }

    /// Time until the next call would be let through
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Trailing-edge debouncer: fires once the triggers have been quiet for `delay`
#[derive(Debug)]
pub struct TrailingDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl TrailingDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Push the deadline out to `now + delay`
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Returns true exactly once per quiet period
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// FIFO throttler: releases queued items in order, one per interval
#[derive(Debug)]
pub struct FifoThrottler<T> {
    queue: VecDeque<T>,
    limiter: LeadingLimiter,
}

impl<T> FifoThrottler<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            limiter: LeadingLimiter::new(interval),
        }
    }

    pub fn push(&mut self, item: T) {
        self.queue.push_back(item);
    }

    /// Next item if one is queued and the interval has elapsed
    pub fn pop_ready(&mut self, now: Instant) -> Option<T> {
        if self.queue.is_empty() || !self.limiter.try_acquire(now) {
            return None;
        }
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_100: Duration = Duration::from_millis(100);

    #[test]
    fn test_leading_limiter() {
        let clock = ManualClock::new();
        let mut limiter = LeadingLimiter::new(MS_100);

        assert!(limiter.try_acquire(clock.now()));
        assert!(!limiter.try_acquire(clock.now()));

        clock.advance(Duration::from_millis(60));
        assert!(!limiter.try_acquire(clock.now()));
        assert_eq!(limiter.remaining(clock.now()), Duration::from_millis(40));

        clock.advance(Duration::from_millis(40));
        assert!(limiter.try_acquire(clock.now()));
    }

    #[test]
    fn test_trailing_debouncer_waits_for_quiet() {
        let clock = ManualClock::new();
        let mut debouncer = TrailingDebouncer::new(MS_100);

        assert!(!debouncer.poll(clock.now()));
        debouncer.trigger(clock.now());
        clock.advance(Duration::from_millis(80));
        debouncer.trigger(clock.now());
        clock.advance(Duration::from_millis(80));
        assert!(!debouncer.poll(clock.now()));

        clock.advance(Duration::from_millis(20));
        assert!(debouncer.poll(clock.now()));
        assert!(!debouncer.poll(clock.now()));
    }

    #[test]
    fn test_trailing_debouncer_cancel() {
        let clock = ManualClock::new();
        let mut debouncer = TrailingDebouncer::new(MS_100);
        debouncer.trigger(clock.now());
        debouncer.cancel();
        clock.advance(MS_100);
        assert!(!debouncer.poll(clock.now()));
    }

    #[test]
    fn test_fifo_throttler_drains_in_order() {
        let clock = ManualClock::new();
        let mut throttler = FifoThrottler::new(MS_100);
        throttler.push("a");
        throttler.push("b");

        assert_eq!(throttler.pop_ready(clock.now()), Some("a"));
        assert_eq!(throttler.pop_ready(clock.now()), None);

        clock.advance(MS_100);
        assert_eq!(throttler.pop_ready(clock.now()), Some("b"));
        assert!(throttler.is_empty());
    }

    #[test]
    fn test_fifo_throttler_empty_does_not_consume_interval() {
        let clock = ManualClock::new();
        let mut throttler = FifoThrottler::new(MS_100);
        assert_eq!(throttler.pop_ready(clock.now()), None);

        throttler.push(1);
        assert_eq!(throttler.pop_ready(clock.now()), Some(1));
    }
}
