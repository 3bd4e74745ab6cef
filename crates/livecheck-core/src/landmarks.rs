//! Detector landmark layouts.
//!
//! Which landmark index is which facial feature is a contract of the external
//! detector, not of the engine. The blink and roll computations only ever see
//! an [`EyeLandmarks`] triple, so a detector with a different layout needs
//! only a new [`LandmarkLayout`].

use crate::types::Landmark;
use std::fmt;

/// The three points the engine needs from a detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeLandmarks {
    pub right_eye: Landmark,
    pub left_eye: Landmark,
    pub nose: Landmark,
}

impl EyeLandmarks {
    /// In-plane roll of the eye line in degrees.
    pub fn roll_degrees(&self) -> f32 {
        let dx = self.left_eye.x - self.right_eye.x;
        let dy = self.left_eye.y - self.right_eye.y;
        if dx == 0.0 && dy == 0.0 {
            return 0.0;
        }
        dy.atan2(dx).to_degrees()
    }
}

pub trait LandmarkLayout: Send + Sync + fmt::Debug {
    /// Extract eyes and nose, or `None` if the detection is too sparse.
    fn eyes_and_nose(&self, landmarks: &[Landmark]) -> Option<EyeLandmarks>;
}

/// Six-point short-range layout: right eye, left eye, nose tip, mouth,
/// right ear tragion, left ear tragion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortRangeLayout;

impl ShortRangeLayout {
    pub const RIGHT_EYE: usize = 0;
    pub const LEFT_EYE: usize = 1;
    pub const NOSE: usize = 2;
    pub const MIN_POINTS: usize = 6;
}

impl LandmarkLayout for ShortRangeLayout {
    fn eyes_and_nose(&self, landmarks: &[Landmark]) -> Option<EyeLandmarks> {
        if landmarks.len() < Self::MIN_POINTS {
            return None;
        }
        Some(EyeLandmarks {
            right_eye: landmarks[Self::RIGHT_EYE],
            left_eye: landmarks[Self::LEFT_EYE],
            nose: landmarks[Self::NOSE],
        })
    }
}
