use crate::cli::OnvifAuth;
use crate::wsse;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use roxmltree::Document;

const ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

pub struct SoapResponse {
    pub status: u16,
    pub body: String,
}

impl SoapResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Text of the SOAP fault reason, if the body carries one.
    pub fn fault(&self) -> Option<String> {
        fault_reason(&self.body)
    }
}

/// How envelopes are authenticated.
#[derive(Clone, Debug)]
pub struct SoapAuth {
    pub mode: OnvifAuth,
    pub credentials: Option<(String, String)>,
}

pub async fn send(
    client: &Client,
    auth: &SoapAuth,
    endpoint: &str,
    operation: &str,
    body: &str,
) -> Result<SoapResponse> {
    let envelope = envelope(auth, body)?;
    let mut request = client
        .post(endpoint)
        .header("Content-Type", "application/soap+xml; charset=utf-8")
        .body(envelope);
    if auth.mode == OnvifAuth::Basic {
        if let Some((user, pass)) = &auth.credentials {
            request = request.basic_auth(user, Some(pass));
        }
    }
    let response = request
        .send()
        .await
        .with_context(|| format!("soap request failed for {operation} -> {endpoint}"))?;
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    log::trace!("{operation} -> HTTP {status}");
    Ok(SoapResponse { status, body })
}

fn envelope(auth: &SoapAuth, body: &str) -> Result<String> {
    let header = match auth.mode {
        OnvifAuth::Basic => String::new(),
        OnvifAuth::Wsse => {
            let (user, pass) = auth
                .credentials
                .as_ref()
                .ok_or_else(|| anyhow!("onvif wsse auth requires username and password"))?;
            wsse::header(user, pass)?
        }
    };
    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="{ENVELOPE_NS}">{header}<s:Body>{body}</s:Body></s:Envelope>"#
    ))
}

fn fault_reason(body: &str) -> Option<String> {
    let doc = Document::parse(body).ok()?;
    let fault = doc
        .descendants()
        .find(|node| node.tag_name().name() == "Fault")?;
    let text = fault
        .descendants()
        .find(|node| node.tag_name().name() == "Text")
        .and_then(|node| node.text())
        .unwrap_or("unspecified fault");
    Some(text.trim().to_string())
}
