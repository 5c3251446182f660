//! Error types for kairos-client.

use thiserror::Error;

/// Error type for kairos-client operations.
///
/// Errors reported by the server in an `{"errors": [...]}` body are not
/// represented here; they are returned inside the response envelope together
/// with the status code.
#[derive(Error, Debug)]
pub enum Error {
    /// A builder invariant was violated before any request was sent.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The query time range is missing or inconsistent.
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    /// A rollup was built without a query attached.
    #[error("Missing query: {0}")]
    MissingQuery(String),

    /// A group-by entry in a response carried an unknown or missing `name`.
    #[error("Unsupported group-by: {0}")]
    UnsupportedGroupBy(String),

    /// A data point literal does not fit the value type selected for it.
    #[error("Unsupported value for type '{type_name}': {message}")]
    UnsupportedValueType {
        /// Name of the selected data point type.
        type_name: String,
        /// What did not fit.
        message: String,
    },

    /// A data point type with this name is already registered.
    #[error("Data point type already registered: {0}")]
    DuplicateType(String),

    /// Failed to parse a response document or a literal in it.
    #[error("Failed to parse response: {message}")]
    Parse {
        /// Description of what failed to parse.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error on the socket transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The server URL or an endpoint path is invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }
}

/// Result type alias for kairos-client operations.
pub type Result<T> = std::result::Result<T, Error>;
