//! Head movement and postural stability relative to a remembered baseline.
//!
//! Both trackers work on the bounding-box centre. The head-turn tracker
//! measures a deliberate horizontal displacement; the stability tracker
//! requires the centre to stay within a small tolerance for a sustained
//! window. Any motion beyond the tolerance restarts the window: there is no
//! smoothing beyond the single-frame tolerance.

use crate::types::{BoundingBox, HeadPosition};
use std::time::{Duration, Instant};

/// Per-axis displacement still considered "holding still".
pub const STABILITY_TOLERANCE: f32 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadMovement {
    pub left: bool,
    pub right: bool,
}

/// Horizontal head-turn detection against a lazily captured baseline.
#[derive(Debug, Clone)]
pub struct HeadTurnTracker {
    baseline: Option<HeadPosition>,
    threshold: f32,
}

impl HeadTurnTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            baseline: None,
            threshold,
        }
    }

    pub fn baseline(&self) -> Option<HeadPosition> {
        self.baseline
    }

    /// Compare the current box against the baseline. The first frame only
    /// captures the baseline and reports no movement.
    pub fn observe(&mut self, bbox: &BoundingBox, rotation: f32) -> HeadMovement {
        let Some(base) = self.baseline else {
            self.baseline = Some(HeadPosition {
                rotation,
                ..HeadPosition::from_box(bbox)
            });
            tracing::debug!(x = bbox.x_center, y = bbox.y_center, "head-turn baseline captured");
            return HeadMovement::default();
        };

        let dx = bbox.x_center - base.x;
        HeadMovement {
            left: dx < -self.threshold,
            right: dx > self.threshold,
        }
    }

    pub fn reset(&mut self) {
        self.baseline = None;
    }
}

/// Sustained-stillness detection.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    baseline: Option<HeadPosition>,
    stable_since: Option<Instant>,
    duration: Duration,
}

impl StabilityTracker {
    pub fn new(duration: Duration) -> Self {
        Self {
            baseline: None,
            stable_since: None,
            duration,
        }
    }

    pub fn baseline(&self) -> Option<HeadPosition> {
        self.baseline
    }

    /// Returns `true` once the head has stayed within tolerance of the
    /// baseline for at least the configured duration.
    pub fn observe(&mut self, bbox: &BoundingBox, now: Instant) -> bool {
        let Some(base) = self.baseline else {
            self.baseline = Some(HeadPosition::from_box(bbox));
            self.stable_since = Some(now);
            return false;
        };

        let dx = (bbox.x_center - base.x).abs();
        let dy = (bbox.y_center - base.y).abs();

        if dx < STABILITY_TOLERANCE && dy < STABILITY_TOLERANCE {
            let since = *self.stable_since.get_or_insert(now);
            return now.saturating_duration_since(since) >= self.duration;
        }

        tracing::trace!(dx, dy, "movement beyond tolerance, stability window restarted");
        self.baseline = Some(HeadPosition::from_box(bbox));
        self.stable_since = None;
        false
    }

    pub fn reset(&mut self) {
        self.baseline = None;
        self.stable_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32) -> BoundingBox {
        BoundingBox::from_center(x, y, 0.3, 0.35)
    }

    #[test]
    fn test_first_frame_only_captures_baseline() {
        let mut tracker = HeadTurnTracker::new(0.1);
        assert_eq!(tracker.observe(&at(0.5, 0.3), 0.0), HeadMovement::default());
        let base = tracker.baseline().unwrap();
        assert!((base.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_left_turn_beyond_threshold() {
        let mut tracker = HeadTurnTracker::new(0.1);
        tracker.observe(&at(0.5, 0.3), 0.0);
        let movement = tracker.observe(&at(0.35, 0.3), 0.0);
        assert!(movement.left);
        assert!(!movement.right);
    }

    #[test]
    fn test_small_drift_is_not_a_turn() {
        let mut tracker = HeadTurnTracker::new(0.1);
        tracker.observe(&at(0.5, 0.3), 0.0);
        assert_eq!(tracker.observe(&at(0.45, 0.3), 0.0), HeadMovement::default());
        assert_eq!(tracker.observe(&at(0.58, 0.3), 0.0), HeadMovement::default());
    }

    #[test]
    fn test_right_turn_beyond_threshold() {
        let mut tracker = HeadTurnTracker::new(0.1);
        tracker.observe(&at(0.5, 0.3), 0.0);
        assert!(tracker.observe(&at(0.65, 0.3), 0.0).right);
    }

    #[test]
    fn test_baseline_keeps_roll() {
        let mut tracker = HeadTurnTracker::new(0.1);
        tracker.observe(&at(0.5, 0.3), 12.5);
        assert_eq!(tracker.baseline().unwrap().rotation, 12.5);
        tracker.reset();
        assert!(tracker.baseline().is_none());
    }

    #[test]
    fn test_stable_after_duration() {
        let t0 = Instant::now();
        let mut tracker = StabilityTracker::new(Duration::from_millis(500));
        assert!(!tracker.observe(&at(0.50, 0.30), t0));
        assert!(!tracker.observe(&at(0.505, 0.302), t0 + Duration::from_millis(200)));
        assert!(tracker.observe(&at(0.505, 0.302), t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_jump_restarts_window() {
        let t0 = Instant::now();
        let mut tracker = StabilityTracker::new(Duration::from_millis(500));
        tracker.observe(&at(0.50, 0.30), t0);
        assert!(tracker.observe(&at(0.505, 0.302), t0 + Duration::from_millis(600)));

        assert!(!tracker.observe(&at(0.60, 0.30), t0 + Duration::from_millis(700)));
        let base = tracker.baseline().unwrap();
        assert!((base.x - 0.60).abs() < 1e-6);

        // window restarts on the next still frame
        assert!(!tracker.observe(&at(0.60, 0.30), t0 + Duration::from_millis(800)));
        assert!(tracker.observe(&at(0.60, 0.30), t0 + Duration::from_millis(1300)));
    }

    #[test]
    fn test_vertical_motion_also_restarts() {
        let t0 = Instant::now();
        let mut tracker = StabilityTracker::new(Duration::from_millis(100));
        tracker.observe(&at(0.5, 0.30), t0);
        assert!(!tracker.observe(&at(0.5, 0.35), t0 + Duration::from_millis(200)));
    }
}
