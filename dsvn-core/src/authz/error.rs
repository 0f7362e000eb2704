//! Errors produced by the authorization engine

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

/// Errors that can occur while loading, validating, or querying an authz config
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The rules file failed structural validation
    #[error("invalid authz configuration: {0}")]
    InvalidConfig(String),

    /// The rules file (or groups file) could not be located or is not a file
    #[error("authz target not found or not a file: {0}")]
    BadTarget(String),

    /// A query path did not start with `/`
    #[error("path must start with '/': {0}")]
    InvalidPath(String),

    /// Underlying I/O failure while reading a rules file
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
