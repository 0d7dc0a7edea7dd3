//! Error types for virtual file operations

use std::fmt;
use thiserror::Error;

/// Virtual file operation result type
pub type Result<T> = std::result::Result<T, VfsError>;

/// Backend operation result type
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Status code reported by an object store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    InvalidArgument,
    Unavailable,
    Internal,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// Opaque failure status returned by an [`ObjectStore`](crate::store::ObjectStore)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct StoreError {
    pub code: StatusCode,
    pub message: String,
}

impl StoreError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        StoreError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == StatusCode::NotFound
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => StatusCode::NotFound,
            std::io::ErrorKind::AlreadyExists => StatusCode::AlreadyExists,
            std::io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
            std::io::ErrorKind::InvalidInput => StatusCode::InvalidArgument,
            _ => StatusCode::Internal,
        };
        StoreError::new(code, err.to_string())
    }
}

/// Backend call that produced a [`VfsError::Backend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOp {
    List,
    Read,
    Write,
    Finalize,
    Delete,
    Metadata,
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendOp::List => "list",
            BackendOp::Read => "read",
            BackendOp::Write => "write",
            BackendOp::Finalize => "finalize",
            BackendOp::Delete => "delete",
            BackendOp::Metadata => "metadata",
        };
        f.write_str(s)
    }
}

/// Virtual file errors
#[derive(Error, Debug)]
pub enum VfsError {
    /// Malformed or unparsable path
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Path names no bucket and no default bucket is configured
    #[error("No bucket specified and no default bucket configured: {0}")]
    MissingBucket(String),

    /// Pattern matches nothing or object is absent
    #[error("Object does not exist: {0}")]
    NotFound(String),

    /// Backend service failure
    #[error("Backend error during {op}: {source}")]
    Backend {
        op: BackendOp,
        #[source]
        source: StoreError,
    },

    /// Seek target is negative or does not fit in a file offset
    #[error("Invalid seek: resulting offset {0} is out of range")]
    InvalidSeek(i128),

    /// Operation on a closed handle
    #[error("Operation on a closed handle")]
    UseAfterClose,

    /// Unsupported open mode, or operation not allowed in the handle's mode
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// No backend connection has been established
    #[error("Driver is not connected")]
    NotConnected,

    /// The connection the handle was opened on has been torn down
    #[error("Connection was closed while the handle was open")]
    Disconnected,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    /// Returns a mapper that wraps a [`StoreError`] for the given operation.
    pub(crate) fn backend(op: BackendOp) -> impl FnOnce(StoreError) -> VfsError {
        move |source| VfsError::Backend { op, source }
    }
}

impl From<VfsError> for std::io::Error {
    fn from(err: VfsError) -> Self {
        use std::io::ErrorKind;
        let kind = match &err {
            VfsError::InvalidSeek(_) | VfsError::InvalidUri(_) | VfsError::InvalidMode(_) => {
                ErrorKind::InvalidInput
            }
            VfsError::NotFound(_) => ErrorKind::NotFound,
            VfsError::UseAfterClose | VfsError::NotConnected | VfsError::Disconnected => {
                ErrorKind::NotConnected
            }
            VfsError::Io(e) => e.kind(),
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_from_io() {
        let err: StoreError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(err.is_not_found());

        let err: StoreError = std::io::Error::from(std::io::ErrorKind::AlreadyExists).into();
        assert_eq!(err.code, StatusCode::AlreadyExists);
    }

    #[test]
    fn test_backend_error_display() {
        let err = VfsError::backend(BackendOp::Finalize)(StoreError::unavailable("quota"));
        assert_eq!(err.to_string(), "Backend error during finalize: UNAVAILABLE: quota");
    }

    #[test]
    fn test_io_error_kind_mapping() {
        let io: std::io::Error = VfsError::InvalidSeek(-1).into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidInput);

        let io: std::io::Error = VfsError::UseAfterClose.into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotConnected);
    }
}
