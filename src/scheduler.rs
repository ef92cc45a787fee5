//! Batch scheduler: the eligibility frontier (`loaded_count`) and the two
//! triggers that move it forward.
//!
//! The first batch is eager. After that the frontier advances either on a
//! fixed timer or when the viewport reports that a marker just behind the
//! frontier came into proximity.

use std::time::{Duration, Instant};

/// How far behind the frontier the proximity marker sits.
pub const PROXIMITY_WINDOW: usize = 3;

#[derive(Clone, Debug)]
pub struct BatchScheduler {
    loaded_count: usize,
    total: usize,
    batch_size: usize,
    /// Frontier value at which a proximity report last advanced us.
    proximity_advanced_at: Option<usize>,
}

impl BatchScheduler {
    /// Fresh frontier for a newly planned layout: the first batch is eligible at once.
    pub fn new(total: usize, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        BatchScheduler {
            loaded_count: batch_size.min(total),
            total,
            batch_size,
            proximity_advanced_at: None,
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.loaded_count >= self.total
    }

    pub fn is_eligible(&self, visual_index: usize) -> bool {
        visual_index < self.loaded_count
    }

    /// Move the frontier by one batch, clamped to `total`. Returns whether it moved.
    pub fn advance(&mut self) -> bool {
        let next = (self.loaded_count + self.batch_size).min(self.total);
        if next == self.loaded_count {
            return false;
        }
        tracing::debug!(
            "scheduler: frontier {} -> {} of {}",
            self.loaded_count,
            next,
            self.total
        );
        self.loaded_count = next;
        true
    }

    /// `loaded_count - PROXIMITY_WINDOW <= visual_index < loaded_count`
    pub fn in_proximity_window(&self, visual_index: usize) -> bool {
        visual_index >= self.loaded_count.saturating_sub(PROXIMITY_WINDOW)
            && visual_index < self.loaded_count
    }

    /// Handle a proximity report for the marker at `visual_index`.
    ///
    /// Advances at most once per frontier position: repeated reports that
    /// arrive before the frontier moves are ignored.
    pub fn on_proximity(&mut self, visual_index: usize) -> bool {
        if !self.in_proximity_window(visual_index) {
            tracing::debug!(
                "scheduler: proximity at {} outside window of frontier {}",
                visual_index,
                self.loaded_count
            );
            return false;
        }
        if self.proximity_advanced_at == Some(self.loaded_count) {
            return false;
        }
        self.proximity_advanced_at = Some(self.loaded_count);
        self.advance()
    }

    /// Visual index of the marker that should be watched for the next
    /// advance, or `None` once every entry is eligible.
    pub fn trailing_marker(&self) -> Option<usize> {
        if self.is_exhausted() || self.loaded_count == 0 {
            return None;
        }
        Some(self.loaded_count.saturating_sub(PROXIMITY_WINDOW))
    }
}

// ── Timer trigger ───────────────────────────────────────────────────────

/// Advances the frontier once per interval until it is exhausted.
#[derive(Clone, Debug)]
pub struct TimerTrigger {
    interval: Duration,
    next_due: Option<Instant>,
}

impl TimerTrigger {
    pub fn start(interval: Duration, now: Instant) -> Self {
        TimerTrigger {
            interval,
            next_due: Some(now + interval),
        }
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    /// Fire if due. At most one advance per call; the timer stops for good
    /// once the frontier reaches the total.
    pub fn poll(&mut self, now: Instant, scheduler: &mut BatchScheduler) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if scheduler.is_exhausted() {
            self.next_due = None;
            return false;
        }
        if now < due {
            return false;
        }
        let moved = scheduler.advance();
        self.next_due = if scheduler.is_exhausted() {
            tracing::debug!("timer: frontier exhausted, stopping");
            None
        } else {
            Some(now + self.interval)
        };
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_batch_is_eager() {
        let s = BatchScheduler::new(20, 6);
        assert_eq!(s.loaded_count(), 6);
        assert!(s.is_eligible(5));
        assert!(!s.is_eligible(6));
    }

    #[test]
    fn first_batch_clamped_to_small_total() {
        let s = BatchScheduler::new(4, 6);
        assert_eq!(s.loaded_count(), 4);
        assert!(s.is_exhausted());
        assert_eq!(s.trailing_marker(), None);
    }

    #[test]
    fn advance_clamps_at_total() {
        let mut s = BatchScheduler::new(20, 6);
        assert!(s.advance());
        assert!(s.advance());
        assert!(s.advance());
        assert_eq!(s.loaded_count(), 20);
        assert!(!s.advance());
        assert_eq!(s.loaded_count(), 20);
    }

    #[test]
    fn frontier_never_decreases() {
        let mut s = BatchScheduler::new(50, 7);
        let mut prev = s.loaded_count();
        for _ in 0..20 {
            s.advance();
            assert!(s.loaded_count() >= prev);
            assert!(s.loaded_count() <= s.total());
            prev = s.loaded_count();
        }
    }

    #[test]
    fn empty_layout_has_nothing_to_do() {
        let mut s = BatchScheduler::new(0, 6);
        assert_eq!(s.loaded_count(), 0);
        assert!(!s.advance());
        assert!(!s.on_proximity(0));
        assert_eq!(s.trailing_marker(), None);
    }

    #[test]
    fn proximity_window_is_three_behind_frontier() {
        let s = BatchScheduler::new(20, 6);
        assert!(!s.in_proximity_window(2));
        assert!(s.in_proximity_window(3));
        assert!(s.in_proximity_window(5));
        assert!(!s.in_proximity_window(6));
        assert_eq!(s.trailing_marker(), Some(3));
    }

    #[test]
    fn repeated_proximity_report_advances_once() {
        let mut s = BatchScheduler::new(20, 6);
        assert!(s.on_proximity(3));
        assert!(!s.on_proximity(3));
        assert!(!s.on_proximity(3));
        assert_eq!(s.loaded_count(), 12);
    }

    #[test]
    fn repeated_proximity_at_clamped_frontier_is_noop() {
        let mut s = BatchScheduler::new(8, 6);
        assert!(s.on_proximity(5));
        assert_eq!(s.loaded_count(), 8);
        assert!(!s.on_proximity(5));
        assert!(!s.on_proximity(7));
        assert_eq!(s.loaded_count(), 8);
    }

    #[test]
    fn proximity_outside_window_ignored() {
        let mut s = BatchScheduler::new(20, 6);
        assert!(!s.on_proximity(0));
        assert!(!s.on_proximity(10));
        assert_eq!(s.loaded_count(), 6);
    }

    #[test]
    fn small_frontier_window_starts_at_zero() {
        let mut s = BatchScheduler::new(10, 2);
        assert_eq!(s.trailing_marker(), Some(0));
        assert!(s.on_proximity(0));
        assert_eq!(s.loaded_count(), 4);
    }

    #[test]
    fn timer_fires_once_per_interval() {
        let t0 = Instant::now();
        let step = Duration::from_millis(1000);
        let mut s = BatchScheduler::new(20, 6);
        let mut timer = TimerTrigger::start(step, t0);

        assert!(!timer.poll(t0 + Duration::from_millis(500), &mut s));
        assert_eq!(s.loaded_count(), 6);

        assert!(timer.poll(t0 + step, &mut s));
        assert_eq!(s.loaded_count(), 12);
        // Not due again until a full interval after the last firing.
        assert!(!timer.poll(t0 + step + Duration::from_millis(10), &mut s));
        assert!(timer.poll(t0 + step * 2, &mut s));
        assert!(timer.poll(t0 + step * 3, &mut s));
        assert_eq!(s.loaded_count(), 20);
        assert!(!timer.is_active());
        assert!(!timer.poll(t0 + step * 10, &mut s));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let t0 = Instant::now();
        let mut s = BatchScheduler::new(20, 6);
        let mut timer = TimerTrigger::start(Duration::from_millis(10), t0);
        timer.cancel();
        assert!(!timer.poll(t0 + Duration::from_secs(5), &mut s));
        assert_eq!(s.loaded_count(), 6);
    }

    #[test]
    fn timer_on_exhausted_frontier_stops() {
        let t0 = Instant::now();
        let mut s = BatchScheduler::new(3, 6);
        let mut timer = TimerTrigger::start(Duration::from_millis(10), t0);
        assert!(!timer.poll(t0 + Duration::from_millis(20), &mut s));
        assert!(!timer.is_active());
    }
}
