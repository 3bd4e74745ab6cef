//! Frame composition checks: distance from the camera and head-and-shoulders
//! framing. Both work purely on the normalised bounding box.

use crate::types::{BoundingBox, FaceDistance};

/// Box area above which the face is too close.
pub const TOO_CLOSE_AREA: f32 = 0.65;
/// Box area below which the face is too far.
pub const TOO_FAR_AREA: f32 = 0.08;

/// Maximum horizontal offset of the box centre from the frame centre.
pub const MAX_CENTER_OFFSET: f32 = 0.2;
pub const MIN_FACE_HEIGHT: f32 = 0.25;
pub const MAX_FACE_HEIGHT: f32 = 0.5;
/// Allowed band for the top edge, so the whole head is visible with a margin.
pub const MIN_TOP_EDGE: f32 = 0.1;
pub const MAX_TOP_EDGE: f32 = 0.3;
/// The bottom edge must stay above this to leave room for the chest.
pub const MAX_BOTTOM_EDGE: f32 = 0.75;

/// Classify the face distance from the box area. A missing box reads as too far.
pub fn classify_distance(bbox: Option<&BoundingBox>) -> FaceDistance {
    let Some(bbox) = bbox else {
        return FaceDistance::TooFar;
    };
    let area = bbox.area();
    if area > TOO_CLOSE_AREA {
        FaceDistance::TooClose
    } else if area < TOO_FAR_AREA {
        FaceDistance::TooFar
    } else {
        FaceDistance::Good
    }
}

/// Individual framing criteria, kept separate for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingReport {
    pub centered: bool,
    pub height_ok: bool,
    pub head_visible: bool,
    pub chest_space: bool,
}

impl FramingReport {
    pub fn evaluate(bbox: &BoundingBox) -> Self {
        let top = bbox.top();
        Self {
            centered: (bbox.x_center - 0.5).abs() < MAX_CENTER_OFFSET,
            height_ok: (MIN_FACE_HEIGHT..=MAX_FACE_HEIGHT).contains(&bbox.height),
            head_visible: top > MIN_TOP_EDGE && top < MAX_TOP_EDGE,
            chest_space: bbox.bottom() < MAX_BOTTOM_EDGE,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.centered && self.height_ok && self.head_visible && self.chest_space
    }
}

/// Whether the box satisfies every framing criterion.
pub fn is_frame_valid(bbox: Option<&BoundingBox>) -> bool {
    let Some(bbox) = bbox else {
        return false;
    };
    let report = FramingReport::evaluate(bbox);
    if !report.is_valid() {
        tracing::trace!(?report, "framing rejected");
    }
    report.is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x_center: f32, y_center: f32, width: f32, height: f32) -> BoundingBox {
        BoundingBox::from_center(x_center, y_center, width, height)
    }

    #[test]
    fn test_distance_bands() {
        assert_eq!(classify_distance(Some(&bbox(0.5, 0.5, 0.9, 0.9))), FaceDistance::TooClose);
        assert_eq!(classify_distance(Some(&bbox(0.5, 0.5, 0.2, 0.2))), FaceDistance::TooFar);
        assert_eq!(classify_distance(Some(&bbox(0.5, 0.3, 0.4, 0.35))), FaceDistance::Good);
    }

    #[test]
    fn test_missing_box_is_too_far() {
        assert_eq!(classify_distance(None), FaceDistance::TooFar);
        assert!(!is_frame_valid(None));
    }

    #[test]
    fn test_well_framed_head_and_shoulders() {
        assert!(is_frame_valid(Some(&bbox(0.5, 0.3, 0.3, 0.35))));
    }

    #[test]
    fn test_off_center_fails() {
        let report = FramingReport::evaluate(&bbox(0.8, 0.3, 0.3, 0.35));
        assert!(!report.centered);
        assert!(report.height_ok && report.head_visible && report.chest_space);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_face_too_small_fails_height() {
        let report = FramingReport::evaluate(&bbox(0.5, 0.3, 0.2, 0.2));
        assert!(!report.height_ok);
    }

    #[test]
    fn test_head_touching_top_edge_fails() {
        // top = 0.25 - 0.2 = 0.05
        let report = FramingReport::evaluate(&bbox(0.5, 0.25, 0.3, 0.4));
        assert!(!report.head_visible);
    }

    #[test]
    fn test_face_too_low_leaves_no_chest_space() {
        // top = 0.29, bottom = 0.79
        let report = FramingReport::evaluate(&bbox(0.5, 0.54, 0.3, 0.5));
        assert!(report.head_visible);
        assert!(!report.chest_space);
    }

    #[test]
    fn test_distance_thresholds_are_exclusive() {
        // width 1.0 keeps the area equal to the height exactly
        assert_eq!(bbox(0.5, 0.5, 1.0, TOO_CLOSE_AREA).area(), TOO_CLOSE_AREA);
        assert_eq!(classify_distance(Some(&bbox(0.5, 0.5, 1.0, 0.65))), FaceDistance::Good);
        assert_eq!(classify_distance(Some(&bbox(0.5, 0.5, 1.0, 0.66))), FaceDistance::TooClose);
        assert_eq!(classify_distance(Some(&bbox(0.5, 0.5, 1.0, 0.08))), FaceDistance::Good);
        assert_eq!(classify_distance(Some(&bbox(0.5, 0.5, 1.0, 0.079))), FaceDistance::TooFar);
    }

    #[test]
    fn test_height_band_is_inclusive() {
        assert!(FramingReport::evaluate(&bbox(0.5, 0.3, 0.3, 0.25)).height_ok);
        assert!(FramingReport::evaluate(&bbox(0.5, 0.3, 0.3, 0.5)).height_ok);
        assert!(!FramingReport::evaluate(&bbox(0.5, 0.3, 0.3, 0.249)).height_ok);
        assert!(!FramingReport::evaluate(&bbox(0.5, 0.3, 0.3, 0.501)).height_ok);
    }

    #[test]
    fn test_top_edge_band_is_exclusive() {
        let at_min = bbox(0.5, 0.2, 0.3, 0.2);
        assert_eq!(at_min.top(), MIN_TOP_EDGE);
        assert!(!FramingReport::evaluate(&at_min).head_visible);

        let at_max = bbox(0.5, 0.6, 0.3, 0.6);
        assert_eq!(at_max.top(), MAX_TOP_EDGE);
        assert!(!FramingReport::evaluate(&at_max).head_visible);

        assert!(FramingReport::evaluate(&bbox(0.5, 0.21, 0.3, 0.2)).head_visible);
        assert!(FramingReport::evaluate(&bbox(0.5, 0.59, 0.3, 0.6)).head_visible);
    }
}
