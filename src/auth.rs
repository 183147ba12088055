use crate::error::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use urlencoding::encode;

#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Opaque credential for the upload backend. Fetched once per run.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

pub fn password_grant_body(username: &str, password: &str) -> String {
    format!(
        "username={}&password={}&grant_type=password",
        encode(username),
        encode(password),
    )
}

/// Exchange username/password for a bearer token via `POST {host}/token`.
pub async fn request_token(
    client: &Client,
    host: &str,
    username: &str,
    password: &str,
) -> Result<BearerToken> {
    let url = format!("{host}/token");
    debug!(url = %url, username = %username, "Requesting upload token");

    let resp = client
        .post(&url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(password_grant_body(username, password))
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication { status, body });
    }

    let token: TokenResponse = resp.json().await?;
    info!(token_type = ?token.token_type, "Authenticated against upload backend");
    Ok(BearerToken::new(token.access_token))
}
