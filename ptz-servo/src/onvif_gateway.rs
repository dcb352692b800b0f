use crate::config::Target;
use crate::gateway::{ActuatorGateway, GatewayError};
use crate::onvif_requests::{self, OnvifRequest, Velocity};
use crate::pulse::{AxisCode, MAX_SPEED};
use crate::soap::{self, SoapAuth, SoapResponse};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use roxmltree::Document;

/// Actuator backed by the ONVIF PTZ service. Start is a ContinuousMove at
/// `speed / 8` of full velocity, stop is a Stop on the moving axes.
pub struct OnvifGateway {
    client: Client,
    auth: SoapAuth,
    ptz_endpoint: String,
    profile_token: String,
}

impl OnvifGateway {
    /// Resolves the media and PTZ service addresses and the first media
    /// profile. Missing service entries fall back to the device endpoint.
    pub async fn connect(client: Client, target: &Target) -> Result<Self> {
        let auth = SoapAuth {
            mode: target.onvif_auth(),
            credentials: target
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
        };
        let device_endpoint = target.onvif_endpoint();

        let request = onvif_requests::get_services();
        let (media_endpoint, ptz_endpoint) =
            match soap::send(&client, &auth, &device_endpoint, request.operation, &request.body)
                .await
            {
                Ok(response) if response.is_success() => (
                    parse_service(&response.body, "ver10/media/wsdl"),
                    parse_service(&response.body, "ver20/ptz/wsdl"),
                ),
                Ok(response) => {
                    log::warn!("GetServices failed with HTTP {}", response.status);
                    (None, None)
                }
                Err(err) => {
                    log::warn!("GetServices failed: {err:#}");
                    (None, None)
                }
            };
        let media_endpoint = media_endpoint.unwrap_or_else(|| device_endpoint.clone());
        let ptz_endpoint = ptz_endpoint.unwrap_or_else(|| device_endpoint.clone());

        let request = onvif_requests::get_profiles();
        let response = soap::send(&client, &auth, &media_endpoint, request.operation, &request.body)
            .await?;
        if !response.is_success() {
            bail!("GetProfiles failed with HTTP {}", response.status);
        }
        let profile_token = parse_profile_token(&response.body)?;
        log::info!("onvif ptz endpoint {ptz_endpoint}, profile {profile_token}");

        Ok(Self {
            client,
            auth,
            ptz_endpoint,
            profile_token,
        })
    }

    async fn call(
        &self,
        action: &'static str,
        code: AxisCode,
        request: OnvifRequest,
    ) -> Result<(), GatewayError> {
        let response = soap::send(
            &self.client,
            &self.auth,
            &self.ptz_endpoint,
            request.operation,
            &request.body,
        )
        .await
        .map_err(transport_error)?;
        check(action, code, &response)
    }
}

#[async_trait]
impl ActuatorGateway for OnvifGateway {
    async fn begin(&self, code: AxisCode, speed: u8) -> Result<(), GatewayError> {
        let request = onvif_requests::continuous_move(&self.profile_token, velocity(code, speed));
        self.call("start", code, request).await
    }

    async fn end(&self, code: AxisCode) -> Result<(), GatewayError> {
        let request = onvif_requests::stop(&self.profile_token, !code.is_zoom(), code.is_zoom());
        self.call("stop", code, request).await
    }
}

fn velocity(code: AxisCode, speed: u8) -> Velocity {
    let scale = f32::from(speed.min(MAX_SPEED)) / f32::from(MAX_SPEED);
    let (pan, tilt, zoom) = code.direction();
    Velocity {
        pan: pan * scale,
        tilt: tilt * scale,
        zoom: zoom * scale,
    }
}

fn check(action: &'static str, code: AxisCode, response: &SoapResponse) -> Result<(), GatewayError> {
    if let Some(reason) = response.fault() {
        return Err(GatewayError::Fault(reason));
    }
    if !response.is_success() {
        return Err(GatewayError::Status {
            action,
            code,
            status: response.status,
        });
    }
    Ok(())
}

fn transport_error(err: anyhow::Error) -> GatewayError {
    match err.downcast_ref::<reqwest::Error>() {
        Some(inner) if inner.is_timeout() => GatewayError::Timeout,
        _ => GatewayError::Other(err),
    }
}

fn parse_service(body: &str, needle: &str) -> Option<String> {
    let doc = Document::parse(body).ok()?;
    doc.descendants()
        .filter(|node| node.tag_name().name() == "Service")
        .find_map(|service| {
            let namespace = service
                .descendants()
                .find(|node| node.tag_name().name() == "Namespace")?
                .text()?;
            if !namespace.contains(needle) {
                return None;
            }
            let xaddrs = service
                .descendants()
                .find(|node| node.tag_name().name() == "XAddr")?
                .text()?;
            select_xaddr(xaddrs)
        })
}

fn parse_profile_token(body: &str) -> Result<String> {
    let doc = Document::parse(body).context("parse GetProfiles response failed")?;
    doc.descendants()
        .find(|node| node.tag_name().name() == "Profiles")
        .and_then(|node| node.attribute("token"))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("profile token not found in GetProfiles response"))
}

fn select_xaddr(text: &str) -> Option<String> {
    let candidates: Vec<&str> = text.split_whitespace().collect();
    candidates
        .iter()
        .find(|addr| addr.starts_with("http://"))
        .or_else(|| candidates.iter().find(|addr| addr.starts_with("https://")))
        .or_else(|| candidates.first())
        .map(|addr| addr.to_string())
}
