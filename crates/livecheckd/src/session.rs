use std::collections::HashMap;
use std::time::Duration;

use livecheck_core::{
    FaceDetectionResult, LivenessConfig, LivenessEngine, LivenessPhase, LivenessSnapshot,
    PhaseError,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("session limit reached ({0} open)")]
    TooManySessions(usize),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("session task exited")]
    ChannelClosed,
}

/// Messages sent from D-Bus handlers to a session task.
enum SessionRequest {
    Start {
        reply: oneshot::Sender<LivenessSnapshot>,
    },
    Process {
        detection: FaceDetectionResult,
        frame_width: u32,
        frame_height: u32,
        reply: oneshot::Sender<LivenessSnapshot>,
    },
    Reset {
        reply: oneshot::Sender<LivenessSnapshot>,
    },
    Snapshot {
        reply: oneshot::Sender<LivenessSnapshot>,
    },
    EnterPhase {
        phase: LivenessPhase,
        reply: oneshot::Sender<Result<LivenessSnapshot, PhaseError>>,
    },
}

/// Clone-safe handle to a session task.
///
/// The task owns the session's [`LivenessEngine`] and serialises every
/// request, so frames are processed strictly one at a time. When the last
/// handle is dropped the task exits and the engine, with any pending timer,
/// is dropped with it.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionRequest,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    pub async fn start_detection(&self) -> Result<LivenessSnapshot, SessionError> {
        self.request(|reply| SessionRequest::Start { reply }).await
    }

    pub async fn process_detection(
        &self,
        detection: FaceDetectionResult,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<LivenessSnapshot, SessionError> {
        self.request(|reply| SessionRequest::Process {
            detection,
            frame_width,
            frame_height,
            reply,
        })
        .await
    }

    pub async fn reset_checks(&self) -> Result<LivenessSnapshot, SessionError> {
        self.request(|reply| SessionRequest::Reset { reply }).await
    }

    pub async fn snapshot(&self) -> Result<LivenessSnapshot, SessionError> {
        self.request(|reply| SessionRequest::Snapshot { reply }).await
    }

    /// Move a captured session into a post-capture phase.
    pub async fn enter_phase(
        &self,
        phase: LivenessPhase,
    ) -> Result<LivenessSnapshot, SessionError> {
        Ok(self
            .request(|reply| SessionRequest::EnterPhase { phase, reply })
            .await??)
    }
}

/// Spawn a session task owning a fresh engine.
pub fn spawn_session(id: &str, config: LivenessConfig) -> SessionHandle {
    let (tx, rx) = mpsc::channel::<SessionRequest>(8);
    let engine = LivenessEngine::new(config);
    tokio::spawn(run_session(id.to_string(), engine, rx));
    SessionHandle { tx }
}

/// Engine timestamps come from tokio's clock so paused-time tests and the
/// timer sleeps below agree on "now".
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn sleep_until_deadline(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

async fn run_session(
    id: String,
    mut engine: LivenessEngine,
    mut rx: mpsc::Receiver<SessionRequest>,
) {
    tracing::info!(session = %id, "session task started");
    loop {
        let deadline = engine.next_deadline();
        tokio::select! {
            req = rx.recv() => match req {
                Some(req) => handle_request(&mut engine, req),
                None => break,
            },
            _ = sleep_until_deadline(deadline) => {
                let fired = engine.poll_timers(now());
                tracing::trace!(session = %id, fired, "session timers fired");
            }
        }
    }
    tracing::info!(session = %id, phase = %engine.phase(), "session task exiting");
}

fn handle_request(engine: &mut LivenessEngine, req: SessionRequest) {
    let now = now();
    match req {
        SessionRequest::Start { reply } => {
            engine.start_detection_at(now);
            let _ = reply.send(engine.snapshot());
        }
        SessionRequest::Process {
            detection,
            frame_width,
            frame_height,
            reply,
        } => {
            engine.process_detection_at(&detection, frame_width, frame_height, now);
            let _ = reply.send(engine.snapshot());
        }
        SessionRequest::Reset { reply } => {
            engine.reset_checks();
            let _ = reply.send(engine.snapshot());
        }
        SessionRequest::Snapshot { reply } => {
            engine.poll_timers(now);
            let _ = reply.send(engine.snapshot());
        }
        SessionRequest::EnterPhase { phase, reply } => {
            let result = engine
                .enter_external_phase(phase)
                .map(|()| engine.snapshot());
            let _ = reply.send(result);
        }
    }
}

struct SessionEntry {
    handle: SessionHandle,
    last_active: Instant,
}

/// Open sessions keyed by UUID.
///
/// A session untouched for `idle_timeout` is evicted the next time a
/// session is created, so clients that vanish without closing do not hold
/// slots forever.
pub struct SessionRegistry {
    sessions: HashMap<String, SessionEntry>,
    liveness: LivenessConfig,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(liveness: LivenessConfig, max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            liveness,
            max_sessions,
            idle_timeout,
        }
    }

    /// Open a new session. Returns its ID.
    pub fn create(&mut self) -> Result<String, SessionError> {
        self.evict_idle();
        if self.sessions.len() >= self.max_sessions {
            return Err(SessionError::TooManySessions(self.sessions.len()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let handle = spawn_session(&id, self.liveness.clone());
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                handle,
                last_active: Instant::now(),
            },
        );
        Ok(id)
    }

    /// Look up a session and mark it active.
    pub fn get(&mut self, id: &str) -> Result<SessionHandle, SessionError> {
        let entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        entry.last_active = Instant::now();
        Ok(entry.handle.clone())
    }

    /// Forget a session. Its task exits once in-flight requests finish.
    pub fn close(&mut self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop sessions idle for at least `idle_timeout`. Returns their IDs.
    pub fn evict_idle(&mut self) -> Vec<String> {
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_active) >= idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.sessions.remove(id);
            tracing::warn!(session = %id, idle_secs = idle_timeout.as_secs(), "idle session evicted");
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecheck_core::{BoundingBox, Landmark, LivenessState, RawDetection};

    fn frame(x: f32, eye_ratio: f32) -> FaceDetectionResult {
        FaceDetectionResult {
            detections: vec![RawDetection {
                landmarks: vec![
                    Landmark::new(0.4, 0.3),
                    Landmark::new(0.6, 0.3),
                    Landmark::new(0.5, 0.3 - eye_ratio * 0.2),
                    Landmark::new(0.5, 0.45),
                    Landmark::new(0.3, 0.32),
                    Landmark::new(0.7, 0.32),
                ],
            }],
            confidence: 0.9,
            bounding_box: Some(BoundingBox::from_center(x, 0.3, 0.3, 0.35)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_face_deadline_fires_without_further_frames() {
        let session = spawn_session("t", LivenessConfig::default());
        session.start_detection().await.unwrap();
        session.process_detection(frame(0.5, 0.3), 1080, 1920).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert_eq!(
            session.snapshot().await.unwrap().phase,
            LivenessPhase::DetectingFace
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            session.snapshot().await.unwrap().phase,
            LivenessPhase::CheckingHeadLeft
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_protocol_through_handle() {
        let session = spawn_session("t", LivenessConfig::default());
        session.start_detection().await.unwrap();
        session.process_detection(frame(0.5, 0.3), 1080, 1920).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1600)).await;

        session.process_detection(frame(0.5, 0.3), 1080, 1920).await.unwrap();
        let snap = session.process_detection(frame(0.35, 0.3), 1080, 1920).await.unwrap();
        assert_eq!(snap.phase, LivenessPhase::CheckingPosition);

        session.process_detection(frame(0.5, 0.3), 1080, 1920).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        let snap = session.process_detection(frame(0.5, 0.3), 1080, 1920).await.unwrap();
        assert!(snap.state.is_liveness_check_passed);
        assert_eq!(snap.phase, LivenessPhase::Capturing);

        let (first, second) = tokio::join!(
            session.enter_phase(LivenessPhase::Uploading),
            session.enter_phase(LivenessPhase::Uploading),
        );
        assert_eq!(first.unwrap().phase, LivenessPhase::Uploading);
        assert!(matches!(
            second,
            Err(SessionError::Phase(PhaseError::InvalidTransition { .. }))
        ));

        session.enter_phase(LivenessPhase::Complete).await.unwrap();
        assert!(session.enter_phase(LivenessPhase::Preview).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blink_indicator_clears_on_its_own() {
        let session = spawn_session("t", LivenessConfig::default());
        session.process_detection(frame(0.5, 0.05), 1080, 1920).await.unwrap();
        let snap = session.process_detection(frame(0.5, 0.3), 1080, 1920).await.unwrap();
        assert!(snap.state.is_blink_detected);

        tokio::time::sleep(Duration::from_millis(10_001)).await;
        let snap = session.snapshot().await.unwrap();
        assert!(!snap.state.is_blink_detected);
        assert_eq!(snap.state.blink_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_blink_reset() {
        let session = spawn_session("t", LivenessConfig::default());
        session.process_detection(frame(0.5, 0.05), 1080, 1920).await.unwrap();
        session.process_detection(frame(0.5, 0.3), 1080, 1920).await.unwrap();

        let snap = session.reset_checks().await.unwrap();
        assert_eq!(snap.phase, LivenessPhase::Initializing);
        assert_eq!(snap.state, LivenessState::default());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(session.snapshot().await.unwrap().state, LivenessState::default());
    }

    #[tokio::test]
    async fn test_enter_phase_before_capture_is_rejected() {
        let session = spawn_session("t", LivenessConfig::default());
        let err = session.enter_phase(LivenessPhase::Complete).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Phase(PhaseError::NotCaptured { .. })
        ));
    }

    const IDLE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_registry_enforces_limit_and_lookup() {
        let mut registry = SessionRegistry::new(LivenessConfig::default(), 1, IDLE);
        let id = registry.create().unwrap();
        assert!(matches!(
            registry.create(),
            Err(SessionError::TooManySessions(1))
        ));
        assert!(registry.get(&id).is_ok());
        assert!(matches!(
            registry.get("nope"),
            Err(SessionError::UnknownSession(_))
        ));

        assert!(registry.close(&id));
        assert!(!registry.close(&id));
        assert_eq!(registry.len(), 0);
        assert!(registry.create().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_sessions_free_their_slots() {
        let mut registry = SessionRegistry::new(LivenessConfig::default(), 16, IDLE);
        let abandoned: Vec<String> = (0..16).map(|_| registry.create().unwrap()).collect();
        assert!(matches!(
            registry.create(),
            Err(SessionError::TooManySessions(16))
        ));

        tokio::time::sleep(IDLE).await;
        let id = registry.create().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&id).is_ok());
        assert!(matches!(
            registry.get(&abandoned[0]),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_sessions_are_not_evicted() {
        let mut registry = SessionRegistry::new(LivenessConfig::default(), 1, IDLE);
        let id = registry.create().unwrap();

        tokio::time::sleep(Duration::from_secs(40)).await;
        registry.get(&id).unwrap();
        tokio::time::sleep(Duration::from_secs(40)).await;

        assert!(registry.evict_idle().is_empty());
        assert!(matches!(
            registry.create(),
            Err(SessionError::TooManySessions(1))
        ));
    }
}
