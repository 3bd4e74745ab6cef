use std::path::PathBuf;

use anyhow::{Context, Result};
use livecheck_core::LivenessConfig;
use livecheck_verify::CaptureConfig;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Liveness thresholds handed to every new session.
    pub liveness: LivenessConfig,
    /// Capture post-processing applied before verification.
    pub capture: CaptureConfig,
    /// Maximum frames per second accepted per session; faster frames are dropped.
    pub fps_limit: u32,
    /// Maximum number of concurrently open sessions.
    pub max_sessions: usize,
    /// Sessions untouched for this long are evicted when a new one is created.
    pub session_idle_secs: u64,
    /// Simulated latency of the mock uniform-verification backend.
    pub verify_delay_ms: u64,
    /// Whether the daemon is running on the session bus (development mode).
    pub session_bus: bool,
}

impl Config {
    /// Load configuration from `LIVECHECK_*` environment variables with defaults.
    ///
    /// `LIVECHECK_CONFIG_FILE` names an optional TOML file with liveness
    /// thresholds; individual `LIVECHECK_*` threshold variables override it.
    pub fn from_env() -> Result<Self> {
        let mut liveness = match std::env::var("LIVECHECK_CONFIG_FILE") {
            Ok(path) => {
                let path = PathBuf::from(path);
                LivenessConfig::from_toml_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?
            }
            Err(_) => LivenessConfig::default(),
        };

        liveness.min_detection_confidence =
            env_f32("LIVECHECK_MIN_CONFIDENCE", liveness.min_detection_confidence);
        liveness.head_movement_threshold =
            env_f32("LIVECHECK_HEAD_MOVEMENT_THRESHOLD", liveness.head_movement_threshold);
        liveness.stability_duration_ms =
            env_u64("LIVECHECK_STABILITY_DURATION_MS", liveness.stability_duration_ms);
        liveness.blink_detection_timeout_ms = env_u64(
            "LIVECHECK_BLINK_TIMEOUT_MS",
            liveness.blink_detection_timeout_ms,
        );
        liveness
            .validate()
            .context("invalid liveness thresholds in environment")?;

        let defaults = CaptureConfig::default();
        let capture = CaptureConfig {
            image_quality: env_u64("LIVECHECK_JPEG_QUALITY", defaults.image_quality as u64)
                .clamp(1, 100) as u8,
            max_size_kb: env_usize("LIVECHECK_MAX_IMAGE_KB", defaults.max_size_kb),
        };

        Ok(Self {
            liveness,
            capture,
            fps_limit: env_u64("LIVECHECK_FPS_LIMIT", 15).max(1) as u32,
            max_sessions: env_usize("LIVECHECK_MAX_SESSIONS", 16),
            session_idle_secs: env_u64("LIVECHECK_SESSION_IDLE_SECS", 300).max(1),
            verify_delay_ms: env_u64("LIVECHECK_VERIFY_DELAY_MS", 1500),
            session_bus: std::env::var("LIVECHECK_SESSION_BUS").is_ok(),
        })
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
