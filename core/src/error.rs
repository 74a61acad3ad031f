/// Recoverable failures surfaced by the recommendation core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecError {
    #[error("unknown item {item_id} (catalog has {num_items} items)")]
    UnknownItem { item_id: u64, num_items: usize },

    #[error("unknown user {user_id} (matrix has {num_users} users)")]
    UnknownUser { user_id: u64, num_users: usize },

    #[error("embedding index is empty")]
    EmptyIndex,

    #[error("cannot sample {requested} columns, only {available} available")]
    InsufficientColumns { requested: usize, available: usize },

    #[error("encoding failed: {0}")]
    EncodingError(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl RecError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RecError::UnknownItem { .. } => "UnknownItem",
            RecError::UnknownUser { .. } => "UnknownUser",
            RecError::EmptyIndex => "EmptyIndex",
            RecError::InsufficientColumns { .. } => "InsufficientColumns",
            RecError::EncodingError(_) => "EncodingError",
            RecError::InvalidInput(_) => "InvalidInput",
            RecError::DimensionMismatch { .. } => "DimensionMismatch",
            RecError::InvalidSnapshot(_) => "InvalidSnapshot",
        }
    }
}

pub type Result<T> = std::result::Result<T, RecError>;
