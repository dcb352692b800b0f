use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha1::{Digest, Sha1};
use time::{macros::format_description, OffsetDateTime};

const PASSWORD_DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";
const SECEXT_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const UTILITY_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";

/// WS-Security UsernameToken header with a fresh nonce per call.
pub fn header(username: &str, password: &str) -> Result<String> {
    let created = created_now()?;
    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);
    Ok(render(username, password, &nonce, &created))
}

fn render(username: &str, password: &str, nonce: &[u8], created: &str) -> String {
    format!(
        r#"<s:Header><Security xmlns="{SECEXT_NS}" s:mustUnderstand="1"><UsernameToken><Username>{user}</Username><Password Type="{PASSWORD_DIGEST_TYPE}">{digest}</Password><Nonce EncodingType="{NONCE_ENCODING}">{nonce}</Nonce><Created xmlns="{UTILITY_NS}">{created}</Created></UsernameToken></Security></s:Header>"#,
        user = xml_escape(username),
        digest = password_digest(nonce, created, password),
        nonce = general_purpose::STANDARD.encode(nonce),
    )
}

fn created_now() -> Result<String> {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    OffsetDateTime::now_utc()
        .format(&format)
        .context("failed to format wsse created timestamp")
}

/// Base64(SHA1(nonce + created + password)).
fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

fn xml_escape(value: &str) -> String {
    value
        .chars()
        .fold(String::with_capacity(value.len()), |mut out, ch| {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&apos;"),
                _ => out.push(ch),
            }
            out
        })
}
