use crate::config::Target;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("ptz-servo/", env!("CARGO_PKG_VERSION"));
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const IDLE_CONNECTION_TTL: Duration = Duration::from_secs(30);

/// Client shared by every pulse sent to the camera. Pulses are a few hundred
/// milliseconds long, so connections are kept warm and Nagle is off.
pub fn build(target: &Target) -> Result<Client> {
    if target.insecure() {
        log::warn!("TLS certificate verification disabled for {}", target.host());
    }
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(target.timeout())
        .connect_timeout(connect_timeout(target.timeout()))
        .pool_idle_timeout(IDLE_CONNECTION_TTL)
        .tcp_nodelay(true)
        .danger_accept_invalid_certs(target.insecure())
        .build()
        .with_context(|| format!("cannot build HTTP client for camera {}", target.host()))
}

fn connect_timeout(request_timeout: Duration) -> Duration {
    request_timeout.min(MAX_CONNECT_TIMEOUT)
}
