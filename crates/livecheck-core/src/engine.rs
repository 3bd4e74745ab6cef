//! The liveness state machine.
//!
//! One [`LivenessEngine`] per session. A caller invokes
//! [`LivenessEngine::start_detection`] once and then
//! [`LivenessEngine::process_detection`] for every frame the detector
//! delivers, one call at a time. Results are read back through
//! [`LivenessEngine::state`] and [`LivenessEngine::phase`].
//!
//! Live path:
//!
//! ```text
//! initializing --start_detection--> detecting-face
//!   --face present when the 1500 ms deadline fires--> checking-head-left
//!   --left turn beyond threshold--> checking-position
//!   --distance good, framing valid, held still--> capturing
//! ```
//!
//! `capturing` is terminal for the engine. The post-capture flow may move the
//! session on through [`LivenessEngine::enter_external_phase`].
//!
//! Timers are deadlines owned by the engine (see [`crate::timers`]). They
//! fire from [`LivenessEngine::poll_timers`], which every frame calls first.
//! Dropping the engine drops its timers.

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::blink::BlinkDetector;
use crate::config::LivenessConfig;
use crate::framing;
use crate::landmarks::{LandmarkLayout, ShortRangeLayout};
use crate::motion::{HeadTurnTracker, StabilityTracker};
use crate::timers::{TimerKind, Timers};
use crate::types::{
    BoundingBox, FaceDetectionResult, FaceDistance, LivenessPhase, LivenessSnapshot,
    LivenessState,
};

/// How long after `start_detection` the engine waits before checking for a face.
pub const FACE_DETECTION_DEADLINE: Duration = Duration::from_millis(1500);

/// User-facing instruction strings.
pub mod instructions {
    pub const POSITION_FACE: &str = "Position your face in the frame";
    pub const REPOSITION: &str = "Please position your face in the frame";
    pub const LOOKING: &str = "Looking for your face...";
    pub const FACE_DETECTED: &str = "Face detected! Preparing liveness check...";
    pub const TURN_HEAD: &str = "Turn your head to the right";
    pub const HEAD_TURNED: &str = "Great! Now position yourself in the frame";
    pub const TOO_CLOSE: &str = "Move back - you're too close";
    pub const TOO_FAR: &str = "Move closer to the camera";
    pub const MATCH_OUTLINE: &str = "Match the outline - center face, show shoulders";
    pub const HOLD_STILL: &str = "Hold still for a moment";
    pub const PASSED: &str = "Perfect! Capturing...";
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseError {
    #[error("phase {0} is driven by the liveness engine")]
    NotExternal(LivenessPhase),
    #[error("cannot enter {target} from {current}: liveness check has not passed")]
    NotCaptured {
        current: LivenessPhase,
        target: LivenessPhase,
    },
    #[error("cannot enter {target} from {current}")]
    InvalidTransition {
        current: LivenessPhase,
        target: LivenessPhase,
    },
}

#[derive(Debug)]
pub struct LivenessEngine {
    config: LivenessConfig,
    layout: Box<dyn LandmarkLayout>,
    state: LivenessState,
    phase: LivenessPhase,
    blink: BlinkDetector,
    head_turn: HeadTurnTracker,
    stability: StabilityTracker,
    timers: Timers,
    /// Set when the face deadline fired without a face; the next frame with
    /// a face then advances on its own.
    face_deadline_elapsed: bool,
}

impl Default for LivenessEngine {
    fn default() -> Self {
        Self::new(LivenessConfig::default())
    }
}

impl LivenessEngine {
    pub fn new(config: LivenessConfig) -> Self {
        Self::with_layout(config, Box::new(ShortRangeLayout))
    }

    /// Create an engine for a detector with a different landmark layout.
    pub fn with_layout(config: LivenessConfig, layout: Box<dyn LandmarkLayout>) -> Self {
        Self {
            head_turn: HeadTurnTracker::new(config.head_movement_threshold),
            stability: StabilityTracker::new(config.stability_duration()),
            layout,
            state: LivenessState::default(),
            phase: LivenessPhase::Initializing,
            blink: BlinkDetector::new(),
            timers: Timers::default(),
            face_deadline_elapsed: false,
            config,
        }
    }

    pub fn state(&self) -> &LivenessState {
        &self.state
    }

    pub fn phase(&self) -> LivenessPhase {
        self.phase
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn snapshot(&self) -> LivenessSnapshot {
        LivenessSnapshot {
            phase: self.phase,
            state: self.state.clone(),
        }
    }

    /// Earliest pending timer deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn is_timer_pending(&self, kind: TimerKind) -> bool {
        self.timers.is_pending(kind)
    }

    pub fn start_detection(&mut self) {
        self.start_detection_at(Instant::now());
    }

    /// Enter `detecting-face` and arm the face-detection deadline.
    ///
    /// Only valid from `initializing`; call [`Self::reset_checks`] to start over.
    pub fn start_detection_at(&mut self, now: Instant) {
        if self.phase != LivenessPhase::Initializing {
            tracing::warn!(phase = %self.phase, "start_detection ignored: session already started");
            return;
        }
        self.set_phase(LivenessPhase::DetectingFace);
        self.instruct(instructions::LOOKING);
        self.face_deadline_elapsed = false;
        self.timers
            .schedule(TimerKind::FaceDeadline, now + FACE_DETECTION_DEADLINE);
    }

    pub fn process_detection(
        &mut self,
        detection: &FaceDetectionResult,
        frame_width: u32,
        frame_height: u32,
    ) {
        self.process_detection_at(detection, frame_width, frame_height, Instant::now());
    }

    /// Per-frame transition. Due timers fire before the frame is evaluated.
    pub fn process_detection_at(
        &mut self,
        detection: &FaceDetectionResult,
        frame_width: u32,
        frame_height: u32,
        now: Instant,
    ) {
        self.poll_timers(now);
        tracing::trace!(
            phase = %self.phase,
            confidence = detection.confidence,
            detections = detection.detections.len(),
            frame_width,
            frame_height,
            "processing frame"
        );

        let present = !detection.detections.is_empty()
            && detection.confidence > self.config.min_detection_confidence;
        self.state.is_face_detected = present;
        if !present {
            self.instruct(instructions::REPOSITION);
            self.state.is_face_in_frame = false;
            self.state.face_distance = FaceDistance::None;
            return;
        }

        self.state.is_face_in_frame = true;
        let bbox = detection.bounding_box.as_ref();
        self.state.face_distance = framing::classify_distance(bbox);

        let eyes = self.layout.eyes_and_nose(detection.landmarks());
        if let Some(eyes) = eyes.as_ref() {
            if self.blink.observe(eyes) {
                self.register_blink(now);
            }
        }
        let rotation = eyes.map(|e| e.roll_degrees()).unwrap_or(0.0);

        match self.phase {
            LivenessPhase::DetectingFace => {
                if self.face_deadline_elapsed {
                    self.begin_head_turn();
                } else {
                    self.instruct(instructions::FACE_DETECTED);
                }
            }
            LivenessPhase::CheckingHeadLeft => self.check_head_turn(bbox, rotation),
            LivenessPhase::CheckingPosition => self.check_position(bbox, now),
            _ => {}
        }
    }

    /// Fire every timer due at `now`. Returns how many fired.
    pub fn poll_timers(&mut self, now: Instant) -> usize {
        let due = self.timers.take_due(now);
        for kind in &due {
            match kind {
                TimerKind::FaceDeadline => self.on_face_deadline(),
                TimerKind::BlinkReset => {
                    self.state.is_blink_detected = false;
                    tracing::trace!("blink indicator cleared");
                }
            }
        }
        due.len()
    }

    /// Restore every flag, baseline and the phase to their initial values
    /// and cancel pending timers. Idempotent.
    pub fn reset_checks(&mut self) {
        self.state = LivenessState::default();
        self.phase = LivenessPhase::Initializing;
        self.blink.reset();
        self.head_turn.reset();
        self.stability.reset();
        self.timers.cancel_all();
        self.face_deadline_elapsed = false;
        tracing::debug!("liveness checks reset");
    }

    /// Move a session that has passed the liveness check into one of the
    /// post-capture phases.
    ///
    /// Allowed: `capturing -> preview | uploading | error`,
    /// `preview -> uploading | error`, `uploading -> complete | error`.
    /// `complete` and `error` are terminal until [`Self::reset_checks`].
    pub fn enter_external_phase(&mut self, target: LivenessPhase) -> Result<(), PhaseError> {
        if !matches!(
            target,
            LivenessPhase::Preview
                | LivenessPhase::Uploading
                | LivenessPhase::Complete
                | LivenessPhase::Error
        ) {
            return Err(PhaseError::NotExternal(target));
        }
        if !self.phase.is_post_capture() {
            return Err(PhaseError::NotCaptured {
                current: self.phase,
                target,
            });
        }
        let allowed = matches!(
            (self.phase, target),
            (
                LivenessPhase::Capturing,
                LivenessPhase::Preview | LivenessPhase::Uploading | LivenessPhase::Error
            ) | (
                LivenessPhase::Preview,
                LivenessPhase::Uploading | LivenessPhase::Error
            ) | (
                LivenessPhase::Uploading,
                LivenessPhase::Complete | LivenessPhase::Error
            )
        );
        if !allowed {
            return Err(PhaseError::InvalidTransition {
                current: self.phase,
                target,
            });
        }
        self.set_phase(target);
        Ok(())
    }

    fn on_face_deadline(&mut self) {
        if self.phase != LivenessPhase::DetectingFace {
            return;
        }
        if self.state.is_face_detected {
            self.begin_head_turn();
        } else {
            tracing::debug!("no face at detection deadline; waiting for the next face");
            self.face_deadline_elapsed = true;
        }
    }

    fn begin_head_turn(&mut self) {
        self.set_phase(LivenessPhase::CheckingHeadLeft);
        self.instruct(instructions::TURN_HEAD);
        self.head_turn.reset();
    }

    fn register_blink(&mut self, now: Instant) {
        self.state.is_blink_detected = true;
        self.state.blink_count = self.state.blink_count.saturating_add(1);
        self.timers.schedule(
            TimerKind::BlinkReset,
            now + self.config.blink_detection_timeout(),
        );
        tracing::debug!(count = self.state.blink_count, "blink detected");
    }

    fn check_head_turn(&mut self, bbox: Option<&BoundingBox>, rotation: f32) {
        self.instruct(instructions::TURN_HEAD);
        let Some(bbox) = bbox else {
            return;
        };

        let movement = self.head_turn.observe(bbox, rotation);
        if movement.right && !self.state.head_movement_right {
            self.state.head_movement_right = true;
            tracing::debug!(x = bbox.x_center, "right head movement observed");
        }
        if movement.left && !self.state.head_movement_left {
            self.state.head_movement_left = true;
            self.state.is_head_movement_detected = true;
            self.stability.reset();
            self.set_phase(LivenessPhase::CheckingPosition);
            self.instruct(instructions::HEAD_TURNED);
        }
    }

    fn check_position(&mut self, bbox: Option<&BoundingBox>, now: Instant) {
        self.state.is_frame_valid = framing::is_frame_valid(bbox);

        match self.state.face_distance {
            FaceDistance::TooClose => return self.instruct(instructions::TOO_CLOSE),
            FaceDistance::TooFar => return self.instruct(instructions::TOO_FAR),
            FaceDistance::Good | FaceDistance::None => {}
        }

        let Some(bbox) = bbox.filter(|_| self.state.is_frame_valid) else {
            return self.instruct(instructions::MATCH_OUTLINE);
        };

        let stable = self.stability.observe(bbox, now);
        self.state.is_stable = stable;
        if !stable {
            return self.instruct(instructions::HOLD_STILL);
        }

        self.state.is_liveness_check_passed = true;
        self.set_phase(LivenessPhase::Capturing);
        self.instruct(instructions::PASSED);
    }

    fn set_phase(&mut self, next: LivenessPhase) {
        if self.phase != next {
            tracing::info!(from = %self.phase, to = %next, "liveness phase changed");
            self.phase = next;
        }
    }

    fn instruct(&mut self, text: &str) {
        if self.state.current_instruction != text {
            self.state.current_instruction.clear();
            self.state.current_instruction.push_str(text);
        }
    }
}
