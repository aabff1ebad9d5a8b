//! Error taxonomy shared by the engine, the stores and the CLI.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OutlayError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutlayError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The record exists but belongs to another owner.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid frequency '{0}' (expected WEEKLY or MONTHLY)")]
    InvalidFrequency(String),

    #[error("Invalid recurring template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid expense: {0}")]
    InvalidExpense(String),

    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    /// Persistence I/O failed in a way that may succeed on retry.
    #[error("Transient store failure: {0}")]
    TransientStore(String),

    /// A conditional due-date update lost the race to another run.
    #[error("Concurrent update conflict")]
    ConcurrentUpdateConflict,

    /// The template store could not be reached at all.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl OutlayError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        OutlayError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same store call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, OutlayError::TransientStore(_))
    }
}
