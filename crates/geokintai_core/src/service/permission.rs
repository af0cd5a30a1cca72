//! Location permission gating.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Always,
    WhenInUse,
    Denied,
    NotDetermined,
}

impl PermissionStatus {
    pub const ALL: [PermissionStatus; 4] = [
        Self::Always,
        Self::WhenInUse,
        Self::Denied,
        Self::NotDetermined,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::WhenInUse => "when_in_use",
            Self::Denied => "denied",
            Self::NotDetermined => "not_determined",
        }
    }
}

/// What the shell should show the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionGuidance {
    None,
    OpenSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub should_run_auto_recording: bool,
    pub guidance: PermissionGuidance,
}

pub struct PermissionPolicy;

impl PermissionPolicy {
    /// Maps a permission status to an auto-recording decision.
    ///
    /// When background recording is required only `Always` allows it;
    /// otherwise every status does.
    pub fn evaluate(
        status: PermissionStatus,
        requires_background_recording: bool,
    ) -> PermissionDecision {
        if !requires_background_recording {
            return PermissionDecision {
                should_run_auto_recording: true,
                guidance: PermissionGuidance::None,
            };
        }

        match status {
            PermissionStatus::Always => PermissionDecision {
                should_run_auto_recording: true,
                guidance: PermissionGuidance::None,
            },
            PermissionStatus::WhenInUse
            | PermissionStatus::Denied
            | PermissionStatus::NotDetermined => PermissionDecision {
                should_run_auto_recording: false,
                guidance: PermissionGuidance::OpenSettings,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PermissionGuidance, PermissionPolicy, PermissionStatus};

    #[test]
    fn only_always_runs_when_background_is_required() {
        for status in PermissionStatus::ALL {
            let decision = PermissionPolicy::evaluate(status, true);
            let allowed = status == PermissionStatus::Always;
            assert_eq!(decision.should_run_auto_recording, allowed, "{status:?}");
            let guidance = if allowed {
                PermissionGuidance::None
            } else {
                PermissionGuidance::OpenSettings
            };
            assert_eq!(decision.guidance, guidance, "{status:?}");
        }
    }

    #[test]
    fn every_status_runs_when_background_is_not_required() {
        for status in PermissionStatus::ALL {
            let decision = PermissionPolicy::evaluate(status, false);
            assert!(decision.should_run_auto_recording);
            assert_eq!(decision.guidance, PermissionGuidance::None);
        }
    }
}
