use gather_core::error::CoreError;

/// Failure reported by a collaborator (metrics backend, profile store,
/// monitored-object filter).
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Failed(String),
}

/// Service-level error for report generation.
///
/// Wraps [`CoreError`] for validation and decode failures and adds the
/// failure modes of talking to collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A collaborator call failed. Never retried.
    #[error("Unable to retrieve {operation}: {source}")]
    Upstream {
        operation: &'static str,
        source: QueryError,
    },

    #[error("Report generation cancelled")]
    Cancelled,

    #[error("{operation} timed out after {timeout_ms}ms")]
    TimedOut {
        operation: &'static str,
        timeout_ms: u64,
    },
}

/// Coarse classification for the handler layer's status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    NotFound,
    BadRequest,
    Internal,
}

impl ReportError {
    pub fn status_class(&self) -> StatusClass {
        match self {
            ReportError::Core(CoreError::NotFound { .. }) => StatusClass::NotFound,
            ReportError::Core(CoreError::Validation(_)) => StatusClass::BadRequest,
            ReportError::Core(CoreError::Decode(_) | CoreError::Internal(_)) => StatusClass::Internal,
            ReportError::Upstream {
                source: QueryError::NotFound { .. },
                ..
            } => StatusClass::NotFound,
            ReportError::Upstream { .. } | ReportError::Cancelled | ReportError::TimedOut { .. } => {
                StatusClass::Internal
            }
        }
    }
}

/// Convenience alias for service return values.
pub type ReportResult<T> = Result<T, ReportError>;
