//! Blink detection from eye/nose landmark geometry.
//!
//! A blink is a full close-then-open cycle: the eye-open ratio must drop
//! below [`EYE_CLOSED_RATIO`] in one frame and return to or above it in a
//! later frame. Closing alone never counts, so a held-up photograph with a
//! fixed geometry produces no blinks at all.

use crate::landmarks::EyeLandmarks;

/// Eye-open ratio below which the eyes are treated as closed.
pub const EYE_CLOSED_RATIO: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EyeState {
    #[default]
    Open,
    Closed,
}

/// Vertical eye-to-nose offset normalised by the inter-eye distance.
///
/// Returns `None` when both eyes coincide, since the ratio is undefined.
pub fn eye_open_ratio(eyes: &EyeLandmarks) -> Option<f32> {
    let eye_distance = eyes.right_eye.distance(&eyes.left_eye);
    if eye_distance <= f32::EPSILON {
        return None;
    }
    let avg_eye_y = (eyes.right_eye.y + eyes.left_eye.y) / 2.0;
    Some((avg_eye_y - eyes.nose.y) / eye_distance)
}

/// Remembers the last eye state across frames.
#[derive(Debug, Clone, Default)]
pub struct BlinkDetector {
    previous: EyeState,
}

impl BlinkDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eye_state(&self) -> EyeState {
        self.previous
    }

    /// Feed one frame. Returns `true` only on the closed→open transition.
    pub fn observe(&mut self, eyes: &EyeLandmarks) -> bool {
        let Some(ratio) = eye_open_ratio(eyes) else {
            return false;
        };
        let current = if ratio < EYE_CLOSED_RATIO {
            EyeState::Closed
        } else {
            EyeState::Open
        };

        let blinked = self.previous == EyeState::Closed && current == EyeState::Open;
        if self.previous != current {
            tracing::trace!(ratio, from = ?self.previous, to = ?current, "eye state changed");
        }
        self.previous = current;
        blinked
    }

    pub fn reset(&mut self) {
        self.previous = EyeState::Open;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;

    /// Eyes 0.2 apart at y = 0.3; the nose height sets the ratio directly:
    /// ratio = (0.3 - nose_y) / 0.2.
    fn eyes_with_ratio(ratio: f32) -> EyeLandmarks {
        EyeLandmarks {
            right_eye: Landmark::new(0.4, 0.3),
            left_eye: Landmark::new(0.6, 0.3),
            nose: Landmark::new(0.5, 0.3 - ratio * 0.2),
        }
    }

    #[test]
    fn test_ratio_matches_geometry() {
        let ratio = eye_open_ratio(&eyes_with_ratio(0.25)).unwrap();
        assert!((ratio - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_coincident_eyes_have_no_ratio() {
        let eyes = EyeLandmarks {
            right_eye: Landmark::new(0.5, 0.3),
            left_eye: Landmark::new(0.5, 0.3),
            nose: Landmark::new(0.5, 0.4),
        };
        assert!(eye_open_ratio(&eyes).is_none());
        let mut detector = BlinkDetector::new();
        assert!(!detector.observe(&eyes));
        assert_eq!(detector.eye_state(), EyeState::Open);
    }

    #[test]
    fn test_open_closed_open_is_one_blink() {
        let mut detector = BlinkDetector::new();
        assert!(!detector.observe(&eyes_with_ratio(0.3)));
        assert!(!detector.observe(&eyes_with_ratio(0.05)));
        assert_eq!(detector.eye_state(), EyeState::Closed);
        assert!(detector.observe(&eyes_with_ratio(0.3)));
        assert!(!detector.observe(&eyes_with_ratio(0.3)));
    }

    #[test]
    fn test_closing_alone_is_not_a_blink() {
        let mut detector = BlinkDetector::new();
        for _ in 0..5 {
            assert!(!detector.observe(&eyes_with_ratio(0.05)));
        }
    }

    #[test]
    fn test_sustained_closure_counts_once_on_reopen() {
        let mut detector = BlinkDetector::new();
        detector.observe(&eyes_with_ratio(0.05));
        detector.observe(&eyes_with_ratio(0.02));
        detector.observe(&eyes_with_ratio(0.10));
        assert!(detector.observe(&eyes_with_ratio(0.2)));
    }

    #[test]
    fn test_reset_forgets_closed_eyes() {
        let mut detector = BlinkDetector::new();
        detector.observe(&eyes_with_ratio(0.05));
        detector.reset();
        assert!(!detector.observe(&eyes_with_ratio(0.3)));
    }
}
