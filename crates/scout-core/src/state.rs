// Derived panel state and the armed-kind vocabulary.

use std::fmt;

use strum::{Display, EnumIter, EnumString};

/// Which flavor of "armed" a panel state represents.
///
/// The configuration maps each kind to a vendor mode *name* (e.g.
/// `Home` -> "Home Mode"); the vendor itself has no notion of kinds,
/// only named modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ArmedKind {
    Home,
    Away,
    Night,
    CustomBypass,
    Vacation,
}

/// The resolved alarm panel state.
///
/// Derived on demand from the latest mode snapshot plus the most recent
/// pushed event -- never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Disarmed,
    Arming,
    Armed(ArmedKind),
    /// Intrusion detected while armed: the siren delay window between a
    /// pushed `triggered` event and the poll reporting `alarmed`.
    Pending,
    Triggered,
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disarmed => write!(f, "disarmed"),
            Self::Arming => write!(f, "arming"),
            Self::Armed(kind) => write!(f, "armed_{kind}"),
            Self::Pending => write!(f, "pending"),
            Self::Triggered => write!(f, "triggered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn armed_states_render_config_style_names() {
        assert_eq!(PanelState::Armed(ArmedKind::Home).to_string(), "armed_home");
        assert_eq!(
            PanelState::Armed(ArmedKind::CustomBypass).to_string(),
            "armed_custom_bypass"
        );
        assert_eq!(PanelState::Triggered.to_string(), "triggered");
    }

    #[test]
    fn armed_kind_parses_snake_case() {
        assert_eq!(ArmedKind::from_str("vacation").unwrap(), ArmedKind::Vacation);
        assert_eq!(
            ArmedKind::from_str("custom_bypass").unwrap(),
            ArmedKind::CustomBypass
        );
        assert!(ArmedKind::from_str("sideways").is_err());
    }
}
