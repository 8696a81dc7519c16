use bazaar_core::ApiError;

/// Errors raised by the data layer.
#[derive(Debug)]
pub enum DataError {
    /// The requested row does not exist.
    NotFound(String),
    /// A uniqueness or foreign-key constraint rejected the write.
    Conflict(String),
    /// Any other driver failure.
    Database(Box<dyn std::error::Error + Send + Sync>),
}

impl DataError {
    /// Wrap a driver error without leaking its type.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "not found: {msg}"),
            DataError::Conflict(msg) => write!(f, "conflict: {msg}"),
            DataError::Database(err) => write!(f, "database error: {err}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => ApiError::NotFound(msg),
            DataError::Conflict(msg) => ApiError::Conflict(msg),
            DataError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Extension trait for converting `sqlx::Error` into `DataError`.
///
/// Orphan rules forbid `From<sqlx::Error> for DataError` outside sqlx, so
/// repositories call `.into_data_error()` at each query site.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match &self {
            sqlx::Error::RowNotFound => DataError::NotFound("row not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DataError::Conflict("already exists".into())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                DataError::Conflict("still referenced by other rows".into())
            }
            _ => DataError::database(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::ApiError;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = sqlx::Error::RowNotFound.into_data_error();
        assert!(matches!(err, DataError::NotFound(_)));
    }

    #[test]
    fn data_errors_map_onto_the_api_taxonomy() {
        assert!(matches!(
            ApiError::from(DataError::NotFound("x".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(DataError::Conflict("x".into())),
            ApiError::Conflict(_)
        ));
    }
}
