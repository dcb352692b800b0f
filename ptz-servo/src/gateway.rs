use crate::pulse::AxisCode;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request did not complete within the client timeout.
    #[error("request timed out")]
    Timeout,
    /// Connection, TLS or protocol failure below HTTP.
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    /// The device answered with a non-success HTTP status.
    #[error("{action} {code} failed with HTTP {status}")]
    Status {
        action: &'static str,
        code: AxisCode,
        status: u16,
    },
    /// The device answered 2xx but reported a fault in the body.
    #[error("device fault: {0}")]
    Fault(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err)
        }
    }
}

/// Remote start/stop actuator. Implementations own the wire format;
/// callers only ever see `AxisCode`.
#[automock]
#[async_trait]
pub trait ActuatorGateway: Send + Sync + 'static {
    async fn begin(&self, code: AxisCode, speed: u8) -> Result<(), GatewayError>;
    async fn end(&self, code: AxisCode) -> Result<(), GatewayError>;
}
