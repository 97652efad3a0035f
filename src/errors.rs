use thiserror::Error;

/// Application-level error type shared by every component operation.
///
/// Validation failures are raised at the boundary of an operation, before any
/// side effect. Model failures other than quota are absorbed into degraded
/// chat outcomes (see `llm_client`) and never surface through this type
/// mid-conversation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// An id was presented for a job it does not belong to
    /// (e.g. pinning another job's version).
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The model provider rejected the call on quota/rate-limit grounds.
    /// Distinct so the caller can show a specific message instead of a
    /// generic failure.
    #[error("Model quota exceeded")]
    QuotaExceeded,

    #[error("Model error: {0}")]
    Llm(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for the thin request layer above this
    /// crate to map onto its own status scheme.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidReference(_) => "INVALID_REFERENCE",
            AppError::QuotaExceeded => "QUOTA_EXCEEDED",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Render(_) => "RENDER_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(anyhow::anyhow!("JSON error: {e}"))
    }
}
