//! Failure classification and handling policy.
//!
//! Message text is localized by the shell; the core only returns the
//! semantic category.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    LocationUnavailable,
    PersistenceWriteFailed,
    PermissionInsufficient,
}

impl FailureType {
    pub const ALL: [FailureType; 3] = [
        Self::LocationUnavailable,
        Self::PersistenceWriteFailed,
        Self::PermissionInsufficient,
    ];

    /// Stable machine tag used in event logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocationUnavailable => "location_unavailable",
            Self::PersistenceWriteFailed => "persistence_write_failed",
            Self::PermissionInsufficient => "permission_insufficient",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMessage {
    LocationRetrying,
    SaveFailedDataKept,
    OpenSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureHandling {
    pub should_retry: bool,
    pub should_preserve_existing_data: bool,
    pub message: UserMessage,
}

impl FailureHandling {
    pub fn for_failure(failure: FailureType) -> Self {
        match failure {
            FailureType::LocationUnavailable => Self {
                should_retry: true,
                should_preserve_existing_data: true,
                message: UserMessage::LocationRetrying,
            },
            FailureType::PersistenceWriteFailed => Self {
                should_retry: false,
                should_preserve_existing_data: true,
                message: UserMessage::SaveFailedDataKept,
            },
            FailureType::PermissionInsufficient => Self {
                should_retry: false,
                should_preserve_existing_data: true,
                message: UserMessage::OpenSettings,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FailureHandling, FailureType, UserMessage};

    #[test]
    fn only_location_failures_retry() {
        for failure in FailureType::ALL {
            let handling = FailureHandling::for_failure(failure);
            assert_eq!(
                handling.should_retry,
                failure == FailureType::LocationUnavailable
            );
            assert!(handling.should_preserve_existing_data);
        }
    }

    #[test]
    fn permission_failure_points_to_settings() {
        assert_eq!(
            FailureHandling::for_failure(FailureType::PermissionInsufficient).message,
            UserMessage::OpenSettings
        );
    }
}
