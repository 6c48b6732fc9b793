// scout-core: alarm panel reconciliation and device state for Scout Alarm
//
// Consumes scout-api and exposes what a presentation layer needs: derived
// panel state, arm/disarm commands, a reactive device store, and one
// façade that wires the whole component graph together.

pub mod alarm;
pub mod config;
pub mod devices;
pub mod error;
pub mod panel;
pub mod state;
pub mod store;

pub use alarm::ScoutAlarm;
pub use config::{ReconcileConfig, ScoutConfig};
pub use error::CoreError;
pub use panel::AlarmPanel;
pub use state::{ArmedKind, PanelState};
pub use store::DeviceStore;
