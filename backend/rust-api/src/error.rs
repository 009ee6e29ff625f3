use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Attempt limit reached: {used} of {allowed} attempts used")]
    QuotaExceeded { allowed: u32, used: u64 },

    #[error("Assessment {assessment_id} does not belong to standard {standard_id}")]
    DomainMismatch {
        assessment_id: String,
        standard_id: String,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::InvalidState(_) => "INVALID_STATE",
            CoreError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            CoreError::DomainMismatch { .. } => "DOMAIN_MISMATCH",
            CoreError::Storage(_) => "STORAGE",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = CoreError::not_found("Attempt", "att-1");
        assert_eq!(err.to_string(), "Attempt att-1 not found");
        assert_eq!(err.code(), "NOT_FOUND");

        let err = CoreError::QuotaExceeded {
            allowed: 3,
            used: 3,
        };
        assert_eq!(err.to_string(), "Attempt limit reached: 3 of 3 attempts used");
    }

    #[test]
    fn storage_errors_convert_from_anyhow() {
        let err: CoreError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.code(), "STORAGE");
        assert_eq!(err.to_string(), "connection reset");
    }
}
