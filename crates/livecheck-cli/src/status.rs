//! `livecheck status`: query a running daemon over D-Bus.

use anyhow::{Context, Result};

#[zbus::proxy(
    interface = "org.livecheck.LiveCheck1",
    default_service = "org.livecheck.LiveCheck1",
    default_path = "/org/livecheck/LiveCheck1"
)]
trait LiveCheck {
    fn status(&self) -> zbus::Result<String>;
}

/// Fetch the daemon's status JSON.
pub async fn status(session_bus: bool) -> Result<serde_json::Value> {
    let conn = if session_bus {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("connecting to D-Bus")?;
    let proxy = LiveCheckProxy::new(&conn)
        .await
        .context("creating livecheckd proxy")?;
    let raw = proxy
        .status()
        .await
        .context("calling Status (is livecheckd running?)")?;
    serde_json::from_str(&raw).context("daemon returned malformed status")
}
