use thiserror::Error;

/// Top-level error type for the `scout-api` crate.
///
/// Covers every failure mode across both API surfaces: authentication,
/// REST transport, and the push channel. `scout-core` maps these into
/// consumer-facing variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, locked account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── REST ────────────────────────────────────────────────────────
    /// Non-success HTTP status from the vendor API.
    #[error("HTTP {status} from {path}")]
    Http { status: u16, path: String },

    /// HTTP 429 — the vendor throttles device polls aggressively.
    /// Callers are expected to keep their cached state on this error.
    #[error("Rate limited on {path}")]
    RateLimited { path: String },

    /// Transport-level failure (connection refused, DNS, timeout, ...).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL construction failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Account shape ───────────────────────────────────────────────
    /// The authenticated member has zero locations. Exactly one location
    /// per account is supported; an empty list is a hard setup error
    /// rather than an out-of-bounds fault.
    #[error("Member has no locations")]
    NoLocation,

    // ── Push channel ────────────────────────────────────────────────
    /// Push transport connection failed.
    #[error("Push connection failed: {0}")]
    PushConnect(String),

    /// The listener task is gone (shut down or crashed).
    #[error("Push listener unavailable")]
    ListenerClosed,
}

impl Error {
    /// Returns `true` if this error indicates rejected credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is the vendor's poll throttle.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
