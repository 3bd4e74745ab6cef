//! livecheck-core: active liveness engine.
//!
//! Interprets a stream of per-frame face detections (bounding box, landmarks,
//! confidence) produced by an external detector and drives a multi-phase
//! protocol: face presence, head turn, framing and postural stability. Blinks
//! are tracked alongside. The engine performs no detection and no I/O.

pub mod blink;
pub mod config;
pub mod engine;
pub mod framing;
pub mod landmarks;
pub mod motion;
pub mod timers;
pub mod types;

pub use config::{ConfigError, LivenessConfig};
pub use engine::{LivenessEngine, PhaseError};
pub use landmarks::{EyeLandmarks, LandmarkLayout, ShortRangeLayout};
pub use types::{
    BoundingBox, FaceDetectionResult, FaceDistance, HeadPosition, Landmark, Lighting,
    LivenessPhase, LivenessSnapshot, LivenessState, RawDetection,
};
