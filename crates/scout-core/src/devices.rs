// ── Device classification ──
//
// Interprets the vendor's device taxonomy and trigger vocabulary.
// Presentation concerns (entity classes, units) stay with the consumer;
// this module only answers domain questions: what is this device, is it
// reachable, is it currently triggered, what does it measure.

use scout_api::models::{Device, TriggerState};

// Trigger vocabulary used by the vendor.
const STATE_OK: &str = "ok";
const STATE_OPEN: &str = "open";
const STATE_MOTION_START: &str = "motion_start";
const STATE_WET: &str = "wet";
const STATE_UNLOCKED: &str = "unlocked";

/// Vendor device taxonomy. Unknown types are preserved rather than
/// rejected so new hardware degrades gracefully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    DoorPanel,
    AccessSensor,
    MotionSensor,
    WaterSensor,
    GlassBreak,
    DoorLock,
    /// Combo smoke/CO unit: one physical device, two trigger sub-states.
    SmokeAlarm,
    Camera,
    Other(String),
}

impl DeviceKind {
    pub fn from_type(device_type: &str) -> Self {
        match device_type {
            "door_panel" => Self::DoorPanel,
            "access_sensor" => Self::AccessSensor,
            "motion_sensor" => Self::MotionSensor,
            "water_sensor" => Self::WaterSensor,
            "glass_break" => Self::GlassBreak,
            "door_lock" => Self::DoorLock,
            "smoke_alarm" => Self::SmokeAlarm,
            "camera" => Self::Camera,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Domain queries over a raw [`Device`].
pub trait DeviceExt {
    fn kind(&self) -> DeviceKind;

    /// A device is unavailable only when the hub reports it timed out.
    fn is_available(&self) -> bool;

    /// Whether the device is currently in its "active" trigger state
    /// (door open, motion started, leak detected, ...).
    fn is_triggered(&self) -> bool;

    /// Smoke sub-state for combo alarms; `false` for everything else.
    fn smoke_triggered(&self) -> bool;

    /// CO sub-state for combo alarms; `false` for everything else.
    fn co_triggered(&self) -> bool;

    fn battery_low(&self) -> bool;
    fn temperature(&self) -> Option<f64>;
    fn humidity(&self) -> Option<f64>;
}

impl DeviceExt for Device {
    fn kind(&self) -> DeviceKind {
        DeviceKind::from_type(&self.device_type)
    }

    fn is_available(&self) -> bool {
        match self.reported.as_ref() {
            Some(reported) => reported.timedout != Some(true),
            None => true,
        }
    }

    fn is_triggered(&self) -> bool {
        let Some(state) = trigger_state(self) else {
            return false;
        };

        match (self.kind(), state) {
            (DeviceKind::DoorPanel | DeviceKind::AccessSensor, TriggerState::Simple(s)) => {
                s == STATE_OPEN
            }
            (DeviceKind::MotionSensor, TriggerState::Simple(s)) => s == STATE_MOTION_START,
            (DeviceKind::WaterSensor, TriggerState::Simple(s)) => s == STATE_WET,
            (DeviceKind::GlassBreak, TriggerState::Simple(s)) => s != STATE_OK,
            (DeviceKind::DoorLock, TriggerState::Simple(s)) => s == STATE_UNLOCKED,
            (DeviceKind::SmokeAlarm, _) => self.smoke_triggered(),
            _ => false,
        }
    }

    fn smoke_triggered(&self) -> bool {
        matches!(
            trigger_state(self),
            Some(TriggerState::Combo { smoke: Some(s), .. }) if s != STATE_OK
        )
    }

    fn co_triggered(&self) -> bool {
        matches!(
            trigger_state(self),
            Some(TriggerState::Combo { co: Some(s), .. }) if s != STATE_OK
        )
    }

    fn battery_low(&self) -> bool {
        self.reported
            .as_ref()
            .and_then(|r| r.battery.as_ref())
            .and_then(|b| b.low)
            .unwrap_or(false)
    }

    fn temperature(&self) -> Option<f64> {
        self.reported.as_ref()?.temperature.as_ref()?.degrees
    }

    fn humidity(&self) -> Option<f64> {
        self.reported.as_ref()?.humidity.as_ref()?.percent
    }
}

fn trigger_state(device: &Device) -> Option<&TriggerState> {
    device
        .reported
        .as_ref()?
        .trigger
        .as_ref()
        .map(|t| &t.state)
}

// ── Tests ────────────────────────────────────────────────────────────
