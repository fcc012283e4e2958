use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::timer::DwellTimer;

/// One visibility measurement of a mounted feed position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityReport {
    pub index: usize,
    pub visible_fraction: f32,
}

impl VisibilityReport {
    pub fn new(index: usize, visible_fraction: f32) -> Self {
        Self {
            index,
            visible_fraction,
        }
    }
}

/// Turns high-rate visibility reports into a debounced active index.
///
/// An index qualifies while at least `threshold` of it is visible. The lowest
/// qualifying index is the candidate; it becomes active only after staying
/// the candidate for the dwell time. Each new candidate restarts the dwell.
///
/// Only mounted indices are tracked, so per-report work is bounded by the
/// size of the virtualization window, not the length of the feed. An index
/// leaves the set on a below-threshold report or on [`forget`]; callers must
/// forget every index they unmount, or a stale low index keeps winning.
///
/// [`forget`]: ViewportTracker::forget
#[derive(Debug)]
pub struct ViewportTracker {
    threshold: f32,
    qualifying: BTreeSet<usize>,
    active: Option<usize>,
    dwell: DwellTimer<usize>,
}

impl ViewportTracker {
    pub fn new(threshold: f32, dwell_time: Duration) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            qualifying: BTreeSet::new(),
            active: None,
            dwell: DwellTimer::new(dwell_time),
        }
    }

    pub fn report(&mut self, report: VisibilityReport, now: Instant) {
        let fraction = if report.visible_fraction.is_nan() {
            0.0
        } else {
            report.visible_fraction.clamp(0.0, 1.0)
        };
        if fraction > 0.0 && fraction >= self.threshold {
            self.qualifying.insert(report.index);
        } else {
            self.qualifying.remove(&report.index);
        }
        self.reconsider(now);
    }

    /// Drops an unmounted index; a pending promotion of it is cancelled.
    pub fn forget(&mut self, index: usize, now: Instant) {
        self.qualifying.remove(&index);
        self.reconsider(now);
    }

    /// Fires the dwell timer. Returns the newly active index, if any.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        let index = self.dwell.poll(now)?;
        if self.candidate() != Some(index) || self.active == Some(index) {
            return None;
        }
        self.active = Some(index);
        Some(index)
    }

    pub fn reset(&mut self) {
        self.qualifying.clear();
        self.active = None;
        self.dwell.cancel();
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn candidate(&self) -> Option<usize> {
        self.qualifying.first().copied()
    }

    pub fn pending(&self) -> Option<usize> {
        self.dwell.pending().copied()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.dwell.deadline()
    }

    fn reconsider(&mut self, now: Instant) {
        match self.candidate() {
            None => {
                self.dwell.cancel();
            }
            Some(candidate) if Some(candidate) == self.active => {
                self.dwell.cancel();
            }
            Some(candidate) => {
                if self.dwell.pending() != Some(&candidate) {
                    self.dwell.schedule(candidate, now);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DWELL: Duration = Duration::from_millis(100);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn tracker() -> ViewportTracker {
        ViewportTracker::new(0.8, DWELL)
    }

    #[test]
    fn promotes_after_dwell() {
        let start = Instant::now();
        let mut tracker = tracker();
        tracker.report(VisibilityReport::new(0, 1.0), start);
        assert_eq!(tracker.tick(start + ms(50)), None);
        assert_eq!(tracker.tick(start + ms(100)), Some(0));
        assert_eq!(tracker.active(), Some(0));
        assert_eq!(tracker.tick(start + ms(300)), None);
    }

    #[test]
    fn below_threshold_never_qualifies() {
        let start = Instant::now();
        let mut tracker = tracker();
        tracker.report(VisibilityReport::new(1, 0.79), start);
        assert_eq!(tracker.candidate(), None);
        assert_eq!(tracker.tick(start + ms(500)), None);
    }

    #[test]
    fn lowest_qualifying_index_wins() {
        let start = Instant::now();
        let mut tracker = tracker();
        tracker.report(VisibilityReport::new(5, 0.9), start);
        tracker.report(VisibilityReport::new(4, 0.85), start);
        assert_eq!(tracker.candidate(), Some(4));
        assert_eq!(tracker.tick(start + ms(100)), Some(4));
    }

    #[test]
    fn flicker_burst_yields_one_change() {
        let start = Instant::now();
        let mut tracker = tracker();
        let mut changes = Vec::new();
        let frames = [
            (0, 3, 0.9, 4, 0.1),
            (20, 3, 0.3, 4, 0.9),
            (40, 4, 0.4, 3, 0.85),
            (60, 3, 0.2, 4, 0.95),
        ];
        for (at, first, first_fraction, second, second_fraction) in frames {
            let now = start + ms(at);
            tracker.report(VisibilityReport::new(first, first_fraction), now);
            tracker.report(VisibilityReport::new(second, second_fraction), now);
            changes.extend(tracker.tick(now));
        }
        for step in (70..=300).step_by(10) {
            changes.extend(tracker.tick(start + ms(step)));
        }
        assert_eq!(changes, vec![4]);
    }

    #[test]
    fn steady_reports_do_not_restart_dwell() {
        let start = Instant::now();
        let mut tracker = tracker();
        for at in (0..100).step_by(16) {
            tracker.report(VisibilityReport::new(2, 1.0), start + ms(at));
        }
        assert_eq!(tracker.next_deadline(), Some(start + DWELL));
        assert_eq!(tracker.tick(start + DWELL), Some(2));
    }

    #[test]
    fn returning_to_active_cancels_pending_promotion() {
        let start = Instant::now();
        let mut tracker = tracker();
        tracker.report(VisibilityReport::new(0, 1.0), start);
        assert_eq!(tracker.tick(start + ms(100)), Some(0));

        tracker.report(VisibilityReport::new(0, 0.5), start + ms(120));
        tracker.report(VisibilityReport::new(1, 0.9), start + ms(120));
        assert_eq!(tracker.pending(), Some(1));
        tracker.report(VisibilityReport::new(1, 0.4), start + ms(150));
        tracker.report(VisibilityReport::new(0, 1.0), start + ms(150));
        assert_eq!(tracker.pending(), None);
        assert_eq!(tracker.tick(start + ms(400)), None);
        assert_eq!(tracker.active(), Some(0));
    }

    #[test]
    fn forgetting_candidate_cancels_timer() {
        let start = Instant::now();
        let mut tracker = tracker();
        tracker.report(VisibilityReport::new(7, 1.0), start);
        tracker.forget(7, start + ms(10));
        assert_eq!(tracker.tick(start + ms(200)), None);
    }

    #[test]
    fn stale_low_index_wins_until_forgotten() {
        let start = Instant::now();
        let mut tracker = tracker();
        tracker.report(VisibilityReport::new(2, 1.0), start);
        tracker.report(VisibilityReport::new(9, 1.0), start + ms(10));
        assert_eq!(tracker.candidate(), Some(2));

        tracker.forget(2, start + ms(20));
        assert_eq!(tracker.candidate(), Some(9));
        assert_eq!(tracker.tick(start + ms(120)), Some(9));
    }

    #[test]
    fn nan_fraction_is_invisible() {
        let start = Instant::now();
        let mut tracker = tracker();
        tracker.report(VisibilityReport::new(0, f32::NAN), start);
        assert_eq!(tracker.candidate(), None);
    }
}
