/// Convenience result type used across Tableau.
pub type TableauResult<T> = Result<T, TableauError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum TableauError {
    /// Invalid user-provided data (out-of-bounds upload rectangles, bad sizes).
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation was invoked on an empty or already released handle.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// A call-order precondition was broken (reading unset state, double initialisation).
    #[error("contract violation: {0}")]
    Contract(String),

    /// The graphics backend refused or failed an operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TableauError {
    /// Build a [`TableauError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TableauError::InvalidHandle`] value.
    pub fn invalid_handle(msg: impl Into<String>) -> Self {
        Self::InvalidHandle(msg.into())
    }

    /// Build a [`TableauError::Contract`] value.
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    /// Build a [`TableauError::Backend`] value.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Build a [`TableauError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for TableauError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
