// Typed request/response wrapper over the Scout REST API.
//
// One generic `request` plus thin typed endpoint wrappers. Every call
// attaches the session's bearer token; there is no automatic retry --
// failures propagate to the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::Error;
use crate::models::{Device, Hub, Location, Member, Mode};
use crate::session::Session;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Async client for the vendor's REST endpoints.
///
/// Cheaply cloneable; shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    session: Arc<Session>,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(session: Arc<Session>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("scout-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Transport)?;

        Ok(Self { session, http })
    }

    /// The session backing this client.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // ── Typed endpoints ──────────────────────────────────────────────

    /// The authenticated member. `GET /auth`
    pub async fn current_member(&self) -> Result<Member, Error> {
        self.get("/auth").await
    }

    /// All locations owned by a member. `GET /members/{id}/locations`
    pub async fn member_locations(&self, member_id: &str) -> Result<Vec<Location>, Error> {
        self.get(&format!("/members/{member_id}/locations")).await
    }

    /// The hub installed at a location. `GET /locations/{id}/hub`
    pub async fn location_hub(&self, location_id: &str) -> Result<Hub, Error> {
        self.get(&format!("/locations/{location_id}/hub")).await
    }

    /// Security modes for a location. `GET /locations/{id}/modes`
    pub async fn location_modes(&self, location_id: &str) -> Result<Vec<Mode>, Error> {
        self.get(&format!("/locations/{location_id}/modes")).await
    }

    /// All devices at a location. `GET /locations/{id}/devices`
    pub async fn location_devices(&self, location_id: &str) -> Result<Vec<Device>, Error> {
        self.get(&format!("/locations/{location_id}/devices")).await
    }

    /// A single device. `GET /devices/{id}`
    ///
    /// This endpoint is the rate-limited one: expect [`Error::RateLimited`]
    /// under frequent polling.
    pub async fn device(&self, device_id: &str) -> Result<Device, Error> {
        self.get(&format!("/devices/{device_id}")).await
    }

    /// Request a mode state change. `POST /modes/{id}`
    ///
    /// `state` is passed through verbatim (`"arming"` or `"disarm"`);
    /// invalid values are rejected server-side only.
    pub async fn update_mode_state(&self, mode_id: &str, state: &str) -> Result<(), Error> {
        let body = serde_json::json!({ "state": state });
        self.send(Method::POST, &format!("/modes/{mode_id}"), Some(&body))
            .await?;
        Ok(())
    }

    // ── Generic request ──────────────────────────────────────────────

    /// Execute a raw API request and return the JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, Error> {
        let resp = self.send(method, path, body).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let resp = self.send(Method::GET, path, None).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, Error> {
        let token = self.session.token().await?;
        let url = self.session.base_url().join(path)?;

        let mut req = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, token)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        debug!(%method, path, %status, "api request");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited { path: path.into() });
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                path: path.into(),
            });
        }
        Ok(resp)
    }
}
