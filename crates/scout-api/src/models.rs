// Wire types for the Scout Alarm REST API and push channel.
//
// Everything here mirrors the vendor's JSON shapes. Domain interpretation
// (panel state derivation, device classification) lives in scout-core.

use serde::{Deserialize, Serialize};

// ── Account ──────────────────────────────────────────────────────────

/// The authenticated member, from `GET /auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub id: String,
}

/// A monitored location. Accounts may own several; this client uses the
/// first one returned and treats it as authoritative.
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hub_id: Option<String>,
}

/// The location's hub record, from `GET /locations/{id}/hub`.
#[derive(Debug, Clone, Deserialize)]
pub struct Hub {
    pub id: String,
    #[serde(rename = "type", default)]
    pub hub_type: Option<String>,
    /// All remaining fields the vendor sends.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

// ── Modes ────────────────────────────────────────────────────────────

/// A named security profile ("Home", "Away", ...) with its current state.
/// The mode list for a location is the ground truth for panel state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub id: String,
    pub name: String,
    pub state: ModeState,
}

/// Authoritative mode state as reported by the poll endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeState {
    Disarmed,
    Arming,
    Armed,
    Alarmed,
}

// ── Pushed events ────────────────────────────────────────────────────

/// A mode transition notification from the push channel.
///
/// This is a transition hint, not a snapshot: the poll endpoint is
/// authoritative and may lag behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeEvent {
    pub mode_id: String,
    pub event: ModeEventKind,
    #[serde(default)]
    pub affector: Option<Affector>,
}

/// The kind of transition a [`ModeEvent`] announces.
///
/// Unknown event names are preserved verbatim rather than failing decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeEventKind {
    Triggered,
    Dismissed,
    Alarmed,
    Armed,
    Arming,
    Disarmed,
    #[serde(untagged)]
    Other(String),
}

impl ModeEventKind {
    /// The settled [`ModeState`] this event announces, if any.
    ///
    /// `triggered` and `dismissed` are instantaneous signals with no
    /// corresponding poll state; unknown events map to nothing.
    pub fn expected_state(&self) -> Option<ModeState> {
        match self {
            Self::Alarmed => Some(ModeState::Alarmed),
            Self::Armed => Some(ModeState::Armed),
            Self::Arming => Some(ModeState::Arming),
            Self::Disarmed => Some(ModeState::Disarmed),
            Self::Triggered | Self::Dismissed | Self::Other(_) => None,
        }
    }
}

/// The actor attributed as the cause of a mode change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affector {
    #[serde(default)]
    pub name: Option<String>,
}

// ── Devices ──────────────────────────────────────────────────────────

/// A sensor or peripheral attached to the location.
///
/// Polled individually or in bulk; push `device` events carry a full
/// replacement `Device`, never a partial patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub name: String,
    #[serde(default)]
    pub reported: Option<Reported>,
}

/// The device's last reported readings and identity fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reported {
    pub trigger: Option<Trigger>,
    pub battery: Option<Battery>,
    pub temperature: Option<Temperature>,
    pub humidity: Option<Humidity>,
    pub manufacturer: Option<String>,
    pub fw_version: Option<String>,
    pub model: Option<String>,
    /// `true` when the hub has lost contact with the device.
    pub timedout: Option<bool>,
}

/// A device's trigger reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub state: TriggerState,
}

/// Trigger state payload. Plain sensors report a single string
/// ("open", "motion_start", ...); combo smoke alarms report separate
/// smoke and CO sub-states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerState {
    Simple(String),
    Combo {
        #[serde(default)]
        smoke: Option<String>,
        #[serde(default)]
        co: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Battery {
    pub low: Option<bool>,
    /// All remaining battery telemetry.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub degrees: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Humidity {
    pub percent: Option<f64>,
}

// ── Tests ────────────────────────────────────────────────────────────
