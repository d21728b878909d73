//! Virtual-clock timer table
//!
//! Each engine owns one `TimerService` keyed by its own event enum. Time only
//! moves when the engine is ticked, so a paused engine cannot fire anything and
//! resumes from exactly the point it stopped.

use serde::{Deserialize, Serialize};

/// Smallest delay a timer may be armed with (repeating timers must make progress)
pub const MIN_TIMER_DELAY_MS: f64 = 1.0;

/// Opaque handle returned by `schedule`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerHandle(u32);

#[derive(Debug, Clone)]
struct Timer<E> {
    handle: TimerHandle,
    due_ms: f64,
    interval_ms: f64,
    repeat: bool,
    event: E,
}

/// Table of pending one-shot and repeating timers
#[derive(Debug, Clone)]
pub struct TimerService<E> {
    now_ms: f64,
    next_id: u32,
    paused: bool,
    timers: Vec<Timer<E>>,
}

impl<E: Copy> Default for TimerService<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Copy> TimerService<E> {
    pub fn new() -> Self {
        Self {
            now_ms: 0.0,
            next_id: 1,
            paused: false,
            timers: Vec::new(),
        }
    }

    /// Current virtual time in milliseconds
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Arm a timer that fires `event` after `delay_ms` (and every `delay_ms` if `repeat`)
    pub fn schedule(&mut self, delay_ms: f64, event: E, repeat: bool) -> TimerHandle {
        let delay = if delay_ms.is_finite() {
            delay_ms.max(MIN_TIMER_DELAY_MS)
        } else {
            MIN_TIMER_DELAY_MS
        };
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            handle,
            due_ms: self.now_ms + delay,
            interval_ms: delay,
            repeat,
            event,
        });
        handle
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    /// Cancel everything; returns how many timers were dropped
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    /// Number of armed timers
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Deliver the earliest timer due at or before `until_ms`.
    ///
    /// The clock jumps to the fired timer's due time, so anything the caller
    /// schedules in response is measured from the logical firing point.
    /// Ties fire in scheduling order.
    pub fn pop_due(&mut self, until_ms: f64) -> Option<(TimerHandle, E)> {
        if self.paused {
            return None;
        }

        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by(|(_, a), (_, b)| {
                a.due_ms
                    .partial_cmp(&b.due_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.handle.0.cmp(&b.handle.0))
            })
            .map(|(i, _)| i)?;

        let timer = &mut self.timers[idx];
        self.now_ms = self.now_ms.max(timer.due_ms);
        let fired = (timer.handle, timer.event);

        if timer.repeat {
            // Re-arm from the due time, not from now, so there is no drift
            timer.due_ms += timer.interval_ms;
        } else {
            self.timers.remove(idx);
        }

        Some(fired)
    }

    /// Move the clock forward once every due event has been drained
    pub fn advance_to(&mut self, until_ms: f64) {
        if !self.paused {
            self.now_ms = self.now_ms.max(until_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ev {
        A,
        B,
    }

    fn drain(timers: &mut TimerService<Ev>, until: f64) -> Vec<(f64, Ev)> {
        let mut out = Vec::new();
        while let Some((_, ev)) = timers.pop_due(until) {
            out.push((timers.now_ms(), ev));
        }
        timers.advance_to(until);
        out
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut timers = TimerService::new();
        timers.schedule(100.0, Ev::A, false);

        assert!(drain(&mut timers, 99.0).is_empty());
        assert_eq!(drain(&mut timers, 150.0), vec![(100.0, Ev::A)]);
        assert!(drain(&mut timers, 1000.0).is_empty());
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_repeating_catches_up_without_drift() {
        let mut timers = TimerService::new();
        timers.schedule(100.0, Ev::A, true);

        let fired = drain(&mut timers, 350.0);
        assert_eq!(fired, vec![(100.0, Ev::A), (200.0, Ev::A), (300.0, Ev::A)]);
        assert_eq!(timers.now_ms(), 350.0);

        let fired = drain(&mut timers, 400.0);
        assert_eq!(fired, vec![(400.0, Ev::A)]);
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut timers = TimerService::new();
        timers.schedule(50.0, Ev::B, false);
        timers.schedule(50.0, Ev::A, false);

        let fired: Vec<Ev> = drain(&mut timers, 50.0).into_iter().map(|(_, e)| e).collect();
        assert_eq!(fired, vec![Ev::B, Ev::A]);
    }

    #[test]
    fn test_cancel() {
        let mut timers = TimerService::new();
        let a = timers.schedule(10.0, Ev::A, true);
        let b = timers.schedule(10.0, Ev::B, false);

        assert!(timers.cancel(a));
        assert!(!timers.cancel(a));
        assert!(timers.is_scheduled(b));
        assert_eq!(drain(&mut timers, 100.0), vec![(10.0, Ev::B)]);
    }

    #[test]
    fn test_cancel_all_reports_count() {
        let mut timers = TimerService::new();
        timers.schedule(10.0, Ev::A, true);
        timers.schedule(20.0, Ev::B, true);
        assert_eq!(timers.cancel_all(), 2);
        assert!(drain(&mut timers, 1000.0).is_empty());
    }

    #[test]
    fn test_paused_clock_does_not_move() {
        let mut timers = TimerService::new();
        timers.schedule(100.0, Ev::A, false);
        timers.pause();

        assert!(drain(&mut timers, 500.0).is_empty());
        assert_eq!(timers.now_ms(), 0.0);

        timers.resume();
        assert_eq!(drain(&mut timers, 100.0), vec![(100.0, Ev::A)]);
    }

    #[test]
    fn test_zero_delay_is_clamped() {
        let mut timers = TimerService::new();
        timers.schedule(0.0, Ev::A, true);
        // Would spin forever without the minimum delay
        assert_eq!(drain(&mut timers, 3.0).len(), 3);
    }

    proptest! {
        #[test]
        fn prop_split_advance_matches_single_advance(
            interval in 5.0f64..200.0,
            splits in proptest::collection::vec(1.0f64..50.0, 1..40),
        ) {
            let total: f64 = splits.iter().sum();

            let mut whole = TimerService::new();
            whole.schedule(interval, Ev::A, true);
            let expected = drain(&mut whole, total);

            let mut pieces = TimerService::new();
            pieces.schedule(interval, Ev::A, true);
            let mut got = Vec::new();
            let mut t = 0.0;
            for step in splits {
                t += step;
                got.extend(drain(&mut pieces, t));
                // Interleave a pause that must not change anything
                pieces.pause();
                got.extend(drain(&mut pieces, t + 1000.0));
                pieces.resume();
            }

            prop_assert_eq!(expected.len(), got.len());
            for (a, b) in expected.iter().zip(got.iter()) {
                prop_assert!((a.0 - b.0).abs() < 1e-6);
            }
        }
    }
}
