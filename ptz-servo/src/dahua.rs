use crate::cli::CameraAuth;
use crate::config::Target;
use crate::digest::{self, Challenge};
use crate::gateway::{ActuatorGateway, GatewayError};
use crate::pulse::{AxisCode, MAX_SPEED};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Response, StatusCode, Url};
use std::sync::{Mutex, PoisonError};

/// Actuator for cameras exposing `/cgi-bin/ptz.cgi?action=start|stop`.
pub struct DahuaGateway {
    client: Client,
    endpoint: String,
    channel: u32,
    mode: CameraAuth,
    credentials: Option<(String, String)>,
    auth: Mutex<AuthState>,
}

#[derive(Default)]
struct AuthState {
    challenge: Option<Challenge>,
    nonce_count: u32,
    basic: bool,
}

enum Credential {
    None,
    Basic,
    Digest(String),
}

impl DahuaGateway {
    pub fn new(client: Client, target: &Target) -> Self {
        let credentials = target
            .credentials()
            .map(|(user, pass)| (user.to_string(), pass.to_string()));
        let auth = AuthState {
            basic: target.auth() == CameraAuth::Basic,
            ..AuthState::default()
        };
        Self {
            client,
            endpoint: target.cgi_endpoint(),
            channel: target.channel(),
            mode: target.auth(),
            credentials,
            auth: Mutex::new(auth),
        }
    }

    fn url(&self, action: &str, code: AxisCode, speed: u8) -> Result<Url, GatewayError> {
        let channel = self.channel.to_string();
        let speed = speed.min(MAX_SPEED).to_string();
        Url::parse_with_params(
            &self.endpoint,
            [
                ("action", action),
                ("channel", channel.as_str()),
                ("code", code.wire_name()),
                ("arg1", "0"),
                ("arg2", speed.as_str()),
                ("arg3", "0"),
            ],
        )
        .map_err(|err| GatewayError::Other(err.into()))
    }

    async fn call(
        &self,
        action: &'static str,
        code: AxisCode,
        speed: u8,
    ) -> Result<(), GatewayError> {
        let url = self.url(action, code, speed)?;
        let mut response = self.send(&url).await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.credentials.is_some() {
            if self.mode != CameraAuth::Basic {
                let challenge = response
                    .headers()
                    .get_all(WWW_AUTHENTICATE)
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .find_map(Challenge::parse);
                if let Some(challenge) = challenge {
                    log::debug!("digest challenge from realm {}", challenge.realm);
                    self.store_challenge(challenge);
                    response = self.send(&url).await?;
                }
            }
            if response.status() == StatusCode::UNAUTHORIZED && self.mode == CameraAuth::Auto {
                let was_basic = std::mem::replace(&mut self.state().basic, true);
                if !was_basic {
                    log::warn!("digest auth rejected, falling back to basic");
                }
                response = self.send(&url).await?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                action,
                code,
                status: status.as_u16(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        if body.trim_start().starts_with("Error") {
            return Err(GatewayError::Fault(body.trim().to_string()));
        }
        Ok(())
    }

    async fn send(&self, url: &Url) -> Result<Response, GatewayError> {
        let mut request = self.client.get(url.clone());
        if let Some((user, pass)) = &self.credentials {
            match self.credential(url) {
                Credential::None => {}
                Credential::Basic => request = request.basic_auth(user, Some(pass)),
                Credential::Digest(header) => request = request.header(AUTHORIZATION, header),
            }
        }
        Ok(request.send().await?)
    }

    fn credential(&self, url: &Url) -> Credential {
        let Some((user, pass)) = &self.credentials else {
            return Credential::None;
        };
        let mut state = self.state();
        if state.basic {
            return Credential::Basic;
        }
        let Some(challenge) = state.challenge.clone() else {
            return Credential::None;
        };
        state.nonce_count += 1;
        let uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        Credential::Digest(challenge.authorization(
            user,
            pass,
            "GET",
            &uri,
            state.nonce_count,
            &digest::cnonce(),
        ))
    }

    fn store_challenge(&self, challenge: Challenge) {
        let mut state = self.state();
        state.challenge = Some(challenge);
        state.nonce_count = 0;
    }

    fn state(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ActuatorGateway for DahuaGateway {
    async fn begin(&self, code: AxisCode, speed: u8) -> Result<(), GatewayError> {
        self.call("start", code, speed).await
    }

    async fn end(&self, code: AxisCode) -> Result<(), GatewayError> {
        self.call("stop", code, 0).await
    }
}
