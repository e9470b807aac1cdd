use platform_db::DbError;
use thiserror::Error;

/// Failures of the service layer. Data-quality problems are never errors;
/// they are reported by the hygiene report.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error(transparent)]
    Store(#[from] DbError),
    #[error("deal {0} already exists")]
    Duplicate(String),
    #[error("invalid deal: {0}")]
    Invalid(String),
}

pub type CrmResult<T> = Result<T, CrmError>;
