use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use livecheck_verify::MockUniformVerifier;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod rate_limiter;
mod session;
mod upload;

use dbus_interface::{AppState, LiveCheckService};
use rate_limiter::FrameRateLimiter;
use session::SessionRegistry;

const BUS_NAME: &str = "org.livecheck.LiveCheck1";
const OBJECT_PATH: &str = "/org/livecheck/LiveCheck1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("livecheckd starting");

    let config = config::Config::from_env()?;
    tracing::info!(
        fps_limit = config.fps_limit,
        max_sessions = config.max_sessions,
        session_idle_secs = config.session_idle_secs,
        session_bus = config.session_bus,
        "configuration loaded"
    );

    let session_bus = config.session_bus;
    let state = AppState {
        sessions: SessionRegistry::new(
            config.liveness.clone(),
            config.max_sessions,
            Duration::from_secs(config.session_idle_secs),
        ),
        rate_limiter: FrameRateLimiter::new(config.fps_limit),
        verifier: Box::new(MockUniformVerifier::new()),
        config,
    };
    let service = LiveCheckService {
        state: Arc::new(Mutex::new(state)),
    };

    let builder = if session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .with_context(|| format!("failed to acquire {BUS_NAME}"))?;

    tracing::info!(name = BUS_NAME, path = OBJECT_PATH, "livecheckd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("livecheckd shutting down");

    Ok(())
}
