//! Error types for the planning core.
//!
//! Missing data is never an error here; it resolves through the fallback
//! defaults documented on each component.

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PlannerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PlannerError::InvalidInput(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend failure: {0}")]
    Backend(String),

    #[error("Itinerary version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u32, found: u32 },
}
