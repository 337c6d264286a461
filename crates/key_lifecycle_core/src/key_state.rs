use std::fmt;

use serde::{Deserialize, Serialize};

/// Key state as reported by the key-management service.
///
/// Only `schedule_deletion` and `cancel_deletion` enforce transitions:
/// `Enabled <-> Disabled -> PendingDeletion | PendingReplicaDeletion -> Disabled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyState {
    Enabled,
    Disabled,
    PendingDeletion,
    PendingReplicaDeletion,
    PendingImport,
    Creating,
    Unavailable,
    Updating,
    Other(String),
}

impl KeyState {
    pub fn from_provider(value: &str) -> Self {
        match value {
            "Enabled" => Self::Enabled,
            "Disabled" => Self::Disabled,
            "PendingDeletion" => Self::PendingDeletion,
            "PendingReplicaDeletion" => Self::PendingReplicaDeletion,
            "PendingImport" => Self::PendingImport,
            "Creating" => Self::Creating,
            "Unavailable" => Self::Unavailable,
            "Updating" => Self::Updating,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Enabled => "Enabled",
            Self::Disabled => "Disabled",
            Self::PendingDeletion => "PendingDeletion",
            Self::PendingReplicaDeletion => "PendingReplicaDeletion",
            Self::PendingImport => "PendingImport",
            Self::Creating => "Creating",
            Self::Unavailable => "Unavailable",
            Self::Updating => "Updating",
            Self::Other(value) => value,
        }
    }

    pub fn is_pending_deletion(&self) -> bool {
        matches!(self, Self::PendingDeletion | Self::PendingReplicaDeletion)
    }

    pub fn can_schedule_deletion(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    pub fn can_cancel_deletion(&self) -> bool {
        self.is_pending_deletion()
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_values_round_trip_through_display() {
        for value in [
            "Enabled",
            "Disabled",
            "PendingDeletion",
            "PendingReplicaDeletion",
            "PendingImport",
            "Creating",
            "Unavailable",
            "Updating",
        ] {
            assert_eq!(KeyState::from_provider(value).to_string(), value);
        }
    }

    #[test]
    fn unknown_provider_value_is_kept_verbatim() {
        let state = KeyState::from_provider("Quarantined");
        assert_eq!(state, KeyState::Other("Quarantined".to_string()));
        assert_eq!(state.as_str(), "Quarantined");
        assert!(!state.can_schedule_deletion());
    }

    #[test]
    fn only_disabled_keys_can_be_scheduled_for_deletion() {
        assert!(KeyState::Disabled.can_schedule_deletion());
        assert!(!KeyState::Enabled.can_schedule_deletion());
        assert!(!KeyState::PendingDeletion.can_schedule_deletion());
    }

    #[test]
    fn both_pending_states_can_be_cancelled() {
        assert!(KeyState::PendingDeletion.can_cancel_deletion());
        assert!(KeyState::PendingReplicaDeletion.can_cancel_deletion());
        assert!(!KeyState::Disabled.can_cancel_deletion());
    }
}
