// ── Alarm panel reconciliation ──
//
// Merges polled mode snapshots with the most recent pushed event into one
// authoritative panel state. The pushed event is a transition hint that
// the poll endpoint is observed to lag behind; refresh() absorbs that lag
// with a bounded retry loop instead of surfacing a stale state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use scout_api::models::{Mode, ModeEvent, ModeEventKind, ModeState};
use scout_api::{Listener, LocationClient};

use crate::config::ReconcileConfig;
use crate::error::CoreError;
use crate::state::{ArmedKind, PanelState};

/// Mode write commands accepted by the vendor.
const COMMAND_ARMING: &str = "arming";
const COMMAND_DISARM: &str = "disarm";

#[derive(Debug, Default)]
struct PanelInner {
    /// Latest polled snapshot. `None` until the first successful poll.
    modes: Option<Vec<Mode>>,
    last_changed_by: Option<String>,
}

/// The alarm panel state machine.
///
/// Polls modes through the [`LocationClient`] and consumes the push
/// listener's mode-change stream; [`state`](Self::state) derives the
/// resolved panel state from both.
pub struct AlarmPanel {
    location: Arc<LocationClient>,
    /// Armed kind -> vendor mode name, from configuration.
    state_to_mode: HashMap<ArmedKind, String>,
    reconcile: ReconcileConfig,
    inner: Mutex<PanelInner>,
    /// Latest pushed event, consumed destructively by reconciliation.
    /// Single-writer: only the listener task replaces it.
    pending: Mutex<Option<ModeEvent>>,
    refresh_tx: watch::Sender<u64>,
}

impl AlarmPanel {
    pub fn new(
        location: Arc<LocationClient>,
        state_to_mode: HashMap<ArmedKind, String>,
        reconcile: ReconcileConfig,
    ) -> Arc<Self> {
        let (refresh_tx, _) = watch::channel(0);
        Arc::new(Self {
            location,
            state_to_mode,
            reconcile,
            inner: Mutex::new(PanelInner::default()),
            pending: Mutex::new(None),
            refresh_tx,
        })
    }

    /// Subscribe this panel to the listener's mode-change stream.
    pub async fn attach(self: &Arc<Self>, listener: &Listener) -> Result<(), CoreError> {
        let panel = Arc::clone(self);
        listener
            .on_mode_change(move |event| panel.apply_pushed_event(event))
            .await?;
        Ok(())
    }

    /// Notification channel bumped on every pushed mode event. The
    /// presentation layer watches this to refresh immediately instead of
    /// waiting for its next poll cycle.
    pub fn refresh_signal(&self) -> watch::Receiver<u64> {
        self.refresh_tx.subscribe()
    }

    /// Who last changed the panel, if the vendor attributed it.
    pub fn last_changed_by(&self) -> Option<String> {
        self.inner.lock().unwrap().last_changed_by.clone()
    }

    /// Armed kinds this panel supports under the configured mapping.
    pub fn supported_kinds(&self) -> Vec<ArmedKind> {
        self.state_to_mode.keys().copied().collect()
    }

    // ── Derived state ────────────────────────────────────────────────

    /// The resolved panel state, or `None` before the first poll.
    pub fn state(&self) -> Option<PanelState> {
        let inner = self.inner.lock().unwrap();
        let modes = inner.modes.as_ref()?;

        // An alarmed mode wins over everything else.
        if modes.iter().any(|m| m.state == ModeState::Alarmed) {
            return Some(PanelState::Triggered);
        }

        if let Some(armed) = modes.iter().find(|m| m.state == ModeState::Armed) {
            if self.has_pending_trigger(&armed.id) {
                return Some(PanelState::Pending);
            }
            let kind = self
                .state_to_mode
                .iter()
                .find(|(_, name)| **name == armed.name)
                .map(|(kind, _)| *kind);
            // Unmapped armed mode: the vendor-side mode list drifted from
            // the configured mapping. Fall back to a generic armed-away.
            return Some(PanelState::Armed(kind.unwrap_or(ArmedKind::Away)));
        }

        if modes.iter().any(|m| m.state == ModeState::Arming) {
            return Some(PanelState::Arming);
        }

        Some(PanelState::Disarmed)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Arm the mode configured for `kind`.
    ///
    /// If the kind has no configured mode name, or no mode with that name
    /// exists at the location, this is a silent no-op: the user mapped a
    /// mode the vendor location does not currently expose.
    pub async fn arm(&self, kind: ArmedKind) -> Result<(), CoreError> {
        let Some(mode) = self.mode_for_kind(kind) else {
            debug!(kind = %kind, "no vendor mode for armed kind, ignoring arm request");
            return Ok(());
        };

        info!(mode = %mode.name, kind = %kind, "arming");
        self.location
            .update_mode_state(&mode.id, COMMAND_ARMING)
            .await?;
        Ok(())
    }

    /// Disarm whichever mode is currently active, preferring an alarmed
    /// mode over armed over arming.
    pub async fn disarm(&self) -> Result<(), CoreError> {
        let Some(mode) = self.active_mode() else {
            debug!("no active mode, ignoring disarm request");
            return Ok(());
        };

        info!(mode = %mode.name, "disarming");
        self.location
            .update_mode_state(&mode.id, COMMAND_DISARM)
            .await?;
        Ok(())
    }

    // ── Poll + reconcile ─────────────────────────────────────────────

    /// Poll the mode list and reconcile it against the most recent pushed
    /// event.
    ///
    /// If an unconsumed pushed event announces a settled state ("armed",
    /// "disarmed", ...), the freshly polled snapshot must agree with it;
    /// the vendor's poll endpoint lags the push channel, so a mismatch
    /// means the poll is stale. This loop re-polls with a fixed delay
    /// until the snapshot catches up, a newer pushed event changes the
    /// expectation, or the attempt ceiling is hit -- at which point the
    /// last poll wins, right or wrong.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let mut modes = self.location.modes().await?;

        if let Some((mut mode_id, mut expected)) = self.take_expectation() {
            let mut attempt: u32 = 0;
            loop {
                if mode_matches(&modes, &mode_id, expected) {
                    break;
                }
                if attempt >= self.reconcile.max_attempts {
                    error!(
                        mode_id = %mode_id,
                        attempts = attempt,
                        "mode never reached its pushed state; panel may be out of sync"
                    );
                    break;
                }

                warn!(
                    mode_id = %mode_id,
                    attempt,
                    "poll behind pushed event, re-polling"
                );
                tokio::time::sleep(self.reconcile.retry_delay).await;
                modes = self.location.modes().await?;

                // A newer settled event supersedes the expectation.
                if let Some((newer_id, newer_state)) = self.take_expectation() {
                    mode_id = newer_id;
                    expected = newer_state;
                }
                attempt += 1;
            }
        }

        let state_len = modes.len();
        self.inner.lock().unwrap().modes = Some(modes);
        debug!(modes = state_len, "mode snapshot updated");
        Ok(())
    }

    // ── Push plumbing ────────────────────────────────────────────────

    /// Feed one pushed mode event into the panel.
    ///
    /// [`attach`](Self::attach) registers this as a listener handler;
    /// it is public for consumers that drive their own event source.
    /// Records the affector as "last changed by", stores the event for
    /// reconciliation, and bumps the refresh signal.
    pub fn apply_pushed_event(&self, event: &ModeEvent) {
        debug!(mode_id = %event.mode_id, event = ?event.event, "pushed mode event");

        if let Some(name) = event.affector.as_ref().and_then(|a| a.name.clone()) {
            self.inner.lock().unwrap().last_changed_by = Some(name);
        }

        *self.pending.lock().unwrap() = Some(event.clone());
        self.refresh_tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Pop the pending event if it announces a settled state. Transition
    /// signals (`triggered`, `dismissed`) stay in the slot: derivation
    /// reads them for the Pending window, and a later push supersedes
    /// them.
    fn take_expectation(&self) -> Option<(String, ModeState)> {
        let mut slot = self.pending.lock().unwrap();
        let expected = slot.as_ref().and_then(|e| e.event.expected_state())?;
        let event = slot.take()?;
        Some((event.mode_id, expected))
    }

    fn has_pending_trigger(&self, mode_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|e| e.event == ModeEventKind::Triggered && e.mode_id == mode_id)
    }

    // ── Mode lookup ──────────────────────────────────────────────────

    fn mode_for_kind(&self, kind: ArmedKind) -> Option<Mode> {
        let name = self.state_to_mode.get(&kind)?;
        let inner = self.inner.lock().unwrap();
        inner
            .modes
            .as_ref()?
            .iter()
            .find(|m| &m.name == name)
            .cloned()
    }

    fn active_mode(&self) -> Option<Mode> {
        let inner = self.inner.lock().unwrap();
        let modes = inner.modes.as_ref()?;
        for state in [ModeState::Alarmed, ModeState::Armed, ModeState::Arming] {
            if let Some(mode) = modes.iter().find(|m| m.state == state) {
                return Some(mode.clone());
            }
        }
        None
    }
}

fn mode_matches(modes: &[Mode], mode_id: &str, expected: ModeState) -> bool {
    modes
        .iter()
        .find(|m| m.id == mode_id)
        .is_some_and(|m| m.state == expected)
}

// ── Tests ────────────────────────────────────────────────────────────
