use std::sync::Arc;
use std::time::Duration;

use livecheck_core::{FaceDetectionResult, LivenessPhase};
use livecheck_verify::UniformVerifier;
use serde::Serialize;
use tokio::sync::Mutex;
use zbus::interface;

use crate::config::Config;
use crate::rate_limiter::FrameRateLimiter;
use crate::session::{SessionHandle, SessionRegistry};
use crate::upload::prepare_capture;

/// Shared state accessible by D-Bus method handlers.
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
    pub rate_limiter: FrameRateLimiter,
    pub verifier: Box<dyn UniformVerifier>,
}

/// D-Bus interface for the liveness daemon.
///
/// Bus name: org.livecheck.LiveCheck1
/// Object path: /org/livecheck/LiveCheck1
pub struct LiveCheckService {
    pub state: Arc<Mutex<AppState>>,
}

fn failed(context: &str, e: impl std::fmt::Display) -> zbus::fdo::Error {
    tracing::error!(error = %e, "{context} failed");
    zbus::fdo::Error::Failed(e.to_string())
}

/// Move a session into `error` after an upload failure.
async fn mark_failed(handle: &SessionHandle, session: &str) {
    if let Err(e) = handle.enter_phase(LivenessPhase::Error).await {
        tracing::warn!(session, error = %e, "could not move session to error phase");
    }
}

fn to_json<T: Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

#[interface(name = "org.livecheck.LiveCheck1")]
impl LiveCheckService {
    /// Open a liveness session. Returns its ID.
    async fn create_session(&self) -> zbus::fdo::Result<String> {
        let mut state = self.state.lock().await;
        for evicted in state.sessions.evict_idle() {
            state.rate_limiter.forget(&evicted);
        }
        let id = state
            .sessions
            .create()
            .map_err(|e| failed("create_session", e))?;
        tracing::info!(session = %id, open = state.sessions.len(), "session created");
        Ok(id)
    }

    /// Begin face detection. Returns the session snapshot as JSON.
    async fn start_detection(&self, session: &str) -> zbus::fdo::Result<String> {
        let handle = self
            .state
            .lock()
            .await
            .sessions
            .get(session)
            .map_err(|e| failed("start_detection", e))?;
        let snapshot = handle
            .start_detection()
            .await
            .map_err(|e| failed("start_detection", e))?;
        to_json(&snapshot)
    }

    /// Feed one detector result (JSON) for a frame of the given size.
    ///
    /// Frames arriving faster than the configured rate are dropped and the
    /// current snapshot is returned unchanged.
    async fn process_detection(
        &self,
        session: &str,
        detection: &str,
        frame_width: u32,
        frame_height: u32,
    ) -> zbus::fdo::Result<String> {
        let detection: FaceDetectionResult = serde_json::from_str(detection).map_err(|e| {
            tracing::warn!(session, error = %e, "process_detection: malformed detection");
            zbus::fdo::Error::InvalidArgs(format!("malformed detection: {e}"))
        })?;

        let (handle, admitted) = {
            let mut state = self.state.lock().await;
            let handle = state
                .sessions
                .get(session)
                .map_err(|e| failed("process_detection", e))?;
            let now = tokio::time::Instant::now().into_std();
            (handle, state.rate_limiter.admit(session, now))
        };

        let snapshot = if admitted {
            handle
                .process_detection(detection, frame_width, frame_height)
                .await
        } else {
            handle.snapshot().await
        }
        .map_err(|e| failed("process_detection", e))?;
        to_json(&snapshot)
    }

    /// Return the session to its initial state.
    async fn reset_checks(&self, session: &str) -> zbus::fdo::Result<String> {
        let handle = {
            let mut state = self.state.lock().await;
            state.rate_limiter.forget(session);
            state
                .sessions
                .get(session)
                .map_err(|e| failed("reset_checks", e))?
        };
        let snapshot = handle
            .reset_checks()
            .await
            .map_err(|e| failed("reset_checks", e))?;
        tracing::info!(session, "checks reset");
        to_json(&snapshot)
    }

    async fn get_state(&self, session: &str) -> zbus::fdo::Result<String> {
        let handle = self
            .state
            .lock()
            .await
            .sessions
            .get(session)
            .map_err(|e| failed("get_state", e))?;
        let snapshot = handle.snapshot().await.map_err(|e| failed("get_state", e))?;
        to_json(&snapshot)
    }

    /// Upload the captured image of a passed session for uniform verification.
    ///
    /// Drives the session through uploading into complete (uniform found) or
    /// error (rejected image, backend failure, or no uniform). Returns the
    /// verification result and the final phase as JSON.
    async fn verify_uniform(&self, session: &str, image: Vec<u8>) -> zbus::fdo::Result<String> {
        tracing::info!(session, size = image.len(), "verify_uniform requested");

        // Copy values while holding lock, then release
        let (handle, capture, delay) = {
            let mut state = self.state.lock().await;
            (
                state
                    .sessions
                    .get(session)
                    .map_err(|e| failed("verify_uniform", e))?,
                state.config.capture,
                Duration::from_millis(state.config.verify_delay_ms),
            )
        };

        // The engine only accepts uploading from capturing or preview, so a
        // second concurrent upload or a finished session is rejected here.
        handle
            .enter_phase(LivenessPhase::Uploading)
            .await
            .map_err(|e| {
                tracing::warn!(session, error = %e, "verify_uniform: nothing to upload");
                zbus::fdo::Error::Failed(format!("session '{session}' has no capture to verify: {e}"))
            })?;

        let prepared = tokio::task::spawn_blocking(move || prepare_capture(&image, &capture))
            .await
            .map_err(|e| failed("verify_uniform", e))?;
        let compressed = match prepared {
            Ok(bytes) => bytes,
            Err(e) => {
                mark_failed(&handle, session).await;
                return Err(failed("verify_uniform", e));
            }
        };

        // Simulated backend latency
        tokio::time::sleep(delay).await;

        let result = self.state.lock().await.verifier.verify(&compressed);
        let verification = match result {
            Ok(v) => v,
            Err(e) => {
                mark_failed(&handle, session).await;
                return Err(failed("verify_uniform", e));
            }
        };

        let outcome = if verification.uniform_detected {
            LivenessPhase::Complete
        } else {
            LivenessPhase::Error
        };
        let snapshot = handle
            .enter_phase(outcome)
            .await
            .map_err(|e| failed("verify_uniform", e))?;

        tracing::info!(
            session,
            detected = verification.uniform_detected,
            confidence = verification.confidence,
            phase = %snapshot.phase,
            "verify_uniform complete"
        );
        Ok(serde_json::json!({
            "verification": verification,
            "phase": snapshot.phase,
        })
        .to_string())
    }

    /// Close a session. Returns false if it was not open.
    async fn close_session(&self, session: &str) -> zbus::fdo::Result<bool> {
        let mut state = self.state.lock().await;
        state.rate_limiter.forget(session);
        let closed = state.sessions.close(session);
        if closed {
            tracing::info!(session, "session closed");
        } else {
            tracing::warn!(session, "close_session: unknown session");
        }
        Ok(closed)
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let state = self.state.lock().await;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "sessions_open": state.sessions.len(),
            "max_sessions": state.config.max_sessions,
            "session_idle_secs": state.config.session_idle_secs,
            "fps_limit": state.config.fps_limit,
            "liveness": state.config.liveness,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
        .to_string())
    }
}
