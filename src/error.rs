use thiserror::Error;

/// Failures the HTTP layer maps to a specific status. Everything else travels
/// as a plain `anyhow::Error` and ends up as a 500.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{feature} is not enabled for this organization")]
    FeatureDisabled { feature: &'static str },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::FeatureDisabled { .. } => "FEATURE_NOT_ENABLED",
            PipelineError::NotFound { .. } => "NOT_FOUND",
            PipelineError::Conflict(_) => "CONFLICT",
            PipelineError::Validation(_) => "VALIDATION_FAILED",
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        PipelineError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
