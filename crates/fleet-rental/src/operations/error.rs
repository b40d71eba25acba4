use super::repository::RepositoryError;

/// Failure taxonomy shared by every fleet service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FleetError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
}

impl FleetError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FleetError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        FleetError::InvalidState(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        FleetError::Validation(message.into())
    }
}
