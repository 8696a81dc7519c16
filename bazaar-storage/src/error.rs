/// Errors raised by [`Storage`](crate::Storage) operations.
#[derive(Debug)]
pub enum StorageError {
    /// The path does not exist.
    NotFound(String),
    /// The process lacks filesystem permission for the path.
    PermissionDenied(String),
    /// The path is absolute or contains parent-traversal segments.
    InvalidPath(String),
    /// Any other I/O failure.
    Io(String),
}

impl StorageError {
    /// Map an I/O error for `path` into the matching kind.
    pub(crate) fn from_io(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StorageError::PermissionDenied(path.to_string())
            }
            _ => StorageError::Io(format!("{path}: {err}")),
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(path) => write!(f, "path not found: {path}"),
            StorageError::PermissionDenied(path) => write!(f, "permission denied: {path}"),
            StorageError::InvalidPath(path) => write!(f, "invalid path: {path}"),
            StorageError::Io(msg) => write!(f, "storage i/o error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}
