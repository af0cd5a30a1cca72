//! Crate-level error taxonomy.
//!
//! # Responsibility
//! - Wrap module errors behind one type for engine and FFI callers.
//! - Expose a stable machine tag and the failure-policy mapping.

use crate::config::ConfigError;
use crate::model::place::PlaceValidationError;
use crate::persistence::PersistenceError;
use crate::repo::RepoError;
use crate::service::correction_service::ValidationError;
use crate::service::export_service::ExportError;
use crate::service::failure::FailureType;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug)]
pub enum CoreError {
    Validation(ValidationError),
    InvalidPlace(PlaceValidationError),
    Repo(RepoError),
    Export(ExportError),
    /// The persistence collaborator failed; in-memory state is kept.
    PersistenceWriteFailed(PersistenceError),
    Config(ConfigError),
}

impl CoreError {
    /// Stable machine tag for logs and FFI envelopes.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidPlace(_) => "validation",
            Self::Repo(
                RepoError::InvalidPlace(_)
                | RepoError::InvalidData(_)
                | RepoError::ExitBeforeEntry(_),
            ) => "validation",
            Self::Repo(_) => "not_found",
            Self::Export(ExportError::NoData) => "no_data",
            Self::Export(ExportError::IntegrityMismatch) => "integrity_mismatch",
            Self::PersistenceWriteFailed(_) => FailureType::PersistenceWriteFailed.as_str(),
            Self::Config(_) => "config",
        }
    }

    /// Policy-table failure for this error, when it has one.
    pub fn failure_type(&self) -> Option<FailureType> {
        match self {
            Self::PersistenceWriteFailed(_) => Some(FailureType::PersistenceWriteFailed),
            _ => None,
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidPlace(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Export(err) => write!(f, "{err}"),
            Self::PersistenceWriteFailed(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidPlace(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Export(err) => Some(err),
            Self::PersistenceWriteFailed(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<PlaceValidationError> for CoreError {
    fn from(value: PlaceValidationError) -> Self {
        Self::InvalidPlace(value)
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ExportError> for CoreError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

impl From<PersistenceError> for CoreError {
    fn from(value: PersistenceError) -> Self {
        Self::PersistenceWriteFailed(value)
    }
}

impl From<ConfigError> for CoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

#[cfg(test)]
mod tests {
    use super::CoreError;
    use crate::persistence::PersistenceError;
    use crate::repo::RepoError;
    use crate::service::export_service::ExportError;
    use crate::service::failure::FailureType;
    use uuid::Uuid;

    #[test]
    fn tags_follow_taxonomy() {
        assert_eq!(
            CoreError::from(RepoError::NoOpenInterval(Uuid::new_v4())).type_tag(),
            "not_found"
        );
        assert_eq!(CoreError::from(ExportError::NoData).type_tag(), "no_data");
        assert_eq!(
            CoreError::from(PersistenceError::Rejected("disk full".to_string())).type_tag(),
            "persistence_write_failed"
        );
    }

    #[test]
    fn only_operational_failures_map_to_policy() {
        assert_eq!(
            CoreError::from(PersistenceError::Rejected("disk full".to_string())).failure_type(),
            Some(FailureType::PersistenceWriteFailed)
        );
        assert_eq!(CoreError::from(ExportError::NoData).failure_type(), None);
    }
}
