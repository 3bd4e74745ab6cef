use serde::{Deserialize, Serialize};
use std::fmt;

/// A single landmark point in normalised image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar (x, y) distance to another landmark.
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One raw detector record. The landmark order is a detector contract,
/// see [`crate::landmarks::LandmarkLayout`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

/// Face bounding box, normalised to [0, 1] of the frame size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub width: f32,
    pub height: f32,
    pub x_center: f32,
    pub y_center: f32,
}

impl BoundingBox {
    /// Build a box from its centre and size; `x_min`/`y_min` are derived.
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_min: x_center - width / 2.0,
            y_min: y_center - height / 2.0,
            width,
            height,
            x_center,
            y_center,
        }
    }

    /// Fraction of the frame covered by the box.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Top edge, derived from the centre rather than `y_min`.
    pub fn top(&self) -> f32 {
        self.y_center - self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y_center + self.height / 2.0
    }
}

/// Detector output for one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetectionResult {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

impl FaceDetectionResult {
    /// A frame in which the detector found nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The first (and normally only) raw detection.
    pub fn primary(&self) -> Option<&RawDetection> {
        self.detections.first()
    }

    /// Landmarks of the primary detection, empty when there is none.
    pub fn landmarks(&self) -> &[Landmark] {
        self.primary().map(|d| d.landmarks.as_slice()).unwrap_or(&[])
    }
}

/// Bounding-box centre snapshot used as a movement/stability baseline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadPosition {
    pub x: f32,
    pub y: f32,
    /// In-plane roll of the eye line in degrees, 0 when unknown.
    pub rotation: f32,
}

impl HeadPosition {
    pub fn from_box(bbox: &BoundingBox) -> Self {
        Self {
            x: bbox.x_center,
            y: bbox.y_center,
            rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaceDistance {
    TooClose,
    TooFar,
    Good,
    #[default]
    None,
}

/// Reserved: no pixel data reaches the engine, so this stays `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lighting {
    Poor,
    Good,
    #[default]
    Unknown,
}

/// Stage of the liveness protocol.
///
/// The engine drives `Initializing → DetectingFace → CheckingHeadLeft →
/// CheckingPosition → Capturing`. `Preview`, `Uploading`, `Complete` and
/// `Error` belong to the flow that runs after capture. `CheckingBlink`,
/// `CheckingHeadRight` and `CheckingStability` are declared for that flow
/// and never entered by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LivenessPhase {
    #[default]
    Initializing,
    DetectingFace,
    CheckingBlink,
    CheckingHeadLeft,
    CheckingHeadRight,
    CheckingPosition,
    CheckingStability,
    Capturing,
    Preview,
    Uploading,
    Complete,
    Error,
}

impl LivenessPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::DetectingFace => "detecting-face",
            Self::CheckingBlink => "checking-blink",
            Self::CheckingHeadLeft => "checking-head-left",
            Self::CheckingHeadRight => "checking-head-right",
            Self::CheckingPosition => "checking-position",
            Self::CheckingStability => "checking-stability",
            Self::Capturing => "capturing",
            Self::Preview => "preview",
            Self::Uploading => "uploading",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Phases reached only after the liveness check has passed.
    pub fn is_post_capture(&self) -> bool {
        matches!(
            self,
            Self::Capturing | Self::Preview | Self::Uploading | Self::Complete | Self::Error
        )
    }
}

impl fmt::Display for LivenessPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable check results. Owned and mutated only by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessState {
    pub is_face_detected: bool,
    pub is_blink_detected: bool,
    pub blink_count: u32,
    pub is_head_movement_detected: bool,
    pub head_movement_left: bool,
    pub head_movement_right: bool,
    pub is_stable: bool,
    pub is_liveness_check_passed: bool,
    pub current_instruction: String,
    pub is_face_in_frame: bool,
    pub is_frame_valid: bool,
    pub face_distance: FaceDistance,
    pub lighting: Lighting,
}

impl Default for LivenessState {
    fn default() -> Self {
        Self {
            is_face_detected: false,
            is_blink_detected: false,
            blink_count: 0,
            is_head_movement_detected: false,
            head_movement_left: false,
            head_movement_right: false,
            is_stable: false,
            is_liveness_check_passed: false,
            current_instruction: crate::engine::instructions::POSITION_FACE.to_string(),
            is_face_in_frame: false,
            is_frame_valid: false,
            face_distance: FaceDistance::None,
            lighting: Lighting::Unknown,
        }
    }
}

/// Read-only view of an engine handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessSnapshot {
    pub phase: LivenessPhase,
    pub state: LivenessState,
}
