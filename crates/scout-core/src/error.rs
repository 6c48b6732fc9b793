// ── Core error types ──
//
// Consumer-facing errors from scout-core. The `From<scout_api::Error>`
// impl translates transport-layer failures into domain-appropriate
// variants; consumers never match on raw HTTP statuses.

use thiserror::Error;

/// Top-level error type for scout-core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Credentials were rejected. Fatal to setup.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The account has no location to operate on.
    #[error("No location available for this account")]
    NoLocation,

    /// The vendor throttled a poll. Cached state should be kept.
    #[error("Rate limited on {path}")]
    RateLimited { path: String },

    /// Any other API failure, with the status when one exists.
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    /// Push channel failure.
    #[error("Push channel error: {reason}")]
    Push { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<scout_api::Error> for CoreError {
    fn from(err: scout_api::Error) -> Self {
        match err {
            scout_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            scout_api::Error::NoLocation => CoreError::NoLocation,
            scout_api::Error::RateLimited { path } => CoreError::RateLimited { path },
            scout_api::Error::Http { status, path } => CoreError::Api {
                message: format!("HTTP {status} from {path}"),
                status: Some(status),
            },
            scout_api::Error::Transport(e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            scout_api::Error::InvalidUrl(e) => CoreError::Internal(format!("invalid URL: {e}")),
            scout_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("deserialization error: {message}"))
            }
            scout_api::Error::PushConnect(reason) => CoreError::Push { reason },
            scout_api::Error::ListenerClosed => CoreError::Push {
                reason: "listener unavailable".into(),
            },
        }
    }
}
