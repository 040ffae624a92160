use thiserror::Error;

/// Failures reported by the persistence collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Failures reported by the advisory collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryError {
    #[error("Advisor request failed: {0}")]
    Request(String),

    #[error("Advisor returned an unusable answer: {0}")]
    InvalidResponse(String),
}

/// Failures placing an order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Order rejected by venue: {0}")]
    Rejected(String),

    #[error("Order transport failed: {0}")]
    Transport(String),
}
