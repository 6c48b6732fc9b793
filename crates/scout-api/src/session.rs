// Credential session for the Scout Alarm cloud API.
//
// Exchanges username/password for a bearer JWT once and reuses it for the
// process lifetime. Also mints per-channel push subscription tokens, which
// are always re-derived rather than cached.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Default vendor API host.
pub const DEFAULT_BASE_URL: &str = "https://api.scoutalarm.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct AuthResponse {
    jwt: String,
}

#[derive(Debug, Deserialize)]
struct ChannelAuthResponse {
    auth: String,
}

/// Owns the login credentials and the cached bearer token.
///
/// The token is fetched lazily on first use and never proactively
/// refreshed or invalidated -- a 401 after expiry surfaces to the caller.
pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    // Held across the login await so concurrent callers trigger one fetch.
    token: Mutex<Option<String>>,
}

impl Session {
    /// Create a session against the default vendor host.
    pub fn new(username: impl Into<String>, password: SecretString) -> Result<Self, Error> {
        let base_url = Url::parse(DEFAULT_BASE_URL)?;
        Self::with_base_url(base_url, username, password)
    }

    /// Create a session against a specific base URL (tests, proxies).
    pub fn with_base_url(
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("scout-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Transport)?;

        Ok(Self {
            http,
            base_url,
            username: username.into(),
            password,
            token: Mutex::new(None),
        })
    }

    /// The API host this session talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the bearer token, logging in on first use.
    pub async fn token(&self) -> Result<String, Error> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = self.login().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Mint an auth string for one push channel subscription.
    ///
    /// Always re-derived from the current token -- the vendor binds the
    /// result to the socket id, so caching would be wrong across reconnects.
    pub async fn channel_token(
        &self,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<String, Error> {
        let token = self.token().await?;
        let url = self.base_url.join("/auth/pusher")?;

        debug!(channel = channel_name, "requesting channel token");

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, token)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("socket_id", socket_id), ("channel_name", channel_name)])
            .send()
            .await?;

        let status = resp.status();
        debug!(%status, "POST /auth/pusher");
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                path: "/auth/pusher".into(),
            });
        }

        let body = resp.text().await?;
        let parsed: ChannelAuthResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;
        Ok(parsed.auth)
    }

    async fn login(&self) -> Result<String, Error> {
        let url = self.base_url.join("/auth")?;

        debug!(username = %self.username, "logging in");

        let body = json!({
            "email": self.username,
            "password": self.password.expose_secret(),
        });

        let resp = self.http.post(url).json(&body).send().await?;

        let status = resp.status();
        debug!(%status, "POST /auth");
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login rejected (HTTP {status})"),
            });
        }

        let body = resp.text().await?;
        let parsed: AuthResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;
        Ok(parsed.jwt)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
