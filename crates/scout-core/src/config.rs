// ── Runtime configuration ──
//
// Describes one Scout account and how to reconcile it. Built by the
// embedding application and handed in -- core never reads config files.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::state::ArmedKind;

/// Tuning for the poll-vs-push reconciliation loop.
///
/// The defaults absorb the vendor's observed propagation lag between a
/// push notification and the poll endpoint catching up. Tests inject
/// short delays here instead of sleeping for real.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// How many stale polls to tolerate before giving up.
    pub max_attempts: u32,
    /// Fixed wait between re-polls.
    pub retry_delay: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Configuration for one Scout Alarm account.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    /// Account email.
    pub username: String,
    /// Account password.
    pub password: SecretString,
    /// Armed-kind to vendor mode name mapping, e.g. `Home` -> "Home Mode".
    /// Kinds without an entry are unsupported on this panel.
    pub modes: HashMap<ArmedKind, String>,
    /// API host override. `None` uses the vendor's production host.
    pub base_url: Option<Url>,
    /// Reconciliation tuning.
    pub reconcile: ReconcileConfig,
    /// Interval for the slow background device poll. The vendor rate
    /// limits the device endpoints, so keep this generous.
    pub device_poll_interval: Duration,
}

impl ScoutConfig {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            modes: HashMap::new(),
            base_url: None,
            reconcile: ReconcileConfig::default(),
            device_poll_interval: Duration::from_secs(900),
        }
    }

    /// Map an armed kind to a vendor mode name.
    pub fn with_mode(mut self, kind: ArmedKind, mode_name: impl Into<String>) -> Self {
        self.modes.insert(kind, mode_name.into());
        self
    }
}
