//! Error types for the column-store execution engine.
//!
//! All public APIs return `DbxResult<T>` — no panics in library code.

use thiserror::Error;

/// Unified error type for all engine operations.
#[derive(Debug, Error)]
pub enum DbxError {
    /// Standard I/O error, surfaced by the persistence and socket layers.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Referenced object (database, table, column or result handle) is unknown.
    #[error("object '{name}' does not exist")]
    ObjectDoesNotExist { name: String },

    /// Creation of an object whose fully-qualified name is already taken.
    #[error("object '{name}' already exists")]
    ObjectAlreadyExists { name: String },

    /// A table's column/row capacity was exceeded and could not be grown.
    #[error("table '{table}' is at capacity")]
    TableAtCapacity { table: String },

    /// The operator is syntactically valid but not supported in this state
    /// (e.g. `insert` on a table that doesn't yet have all its columns).
    #[error("query unsupported: {0}")]
    QueryUnsupported(String),

    /// Malformed operator arguments.
    #[error("incorrect format: {0}")]
    IncorrectFormat(String),

    /// A referenced dump/load path does not exist on disk.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Catch-all for conditions not covered by a more specific variant.
    #[error("error: {0}")]
    Error(String),
}

/// Result type alias for all engine operations.
pub type DbxResult<T> = Result<T, DbxError>;

/// Wire-level status code (section 7). Distinguished from [`DbxError`]: the
/// error type carries a descriptive message for logs, the status code is the
/// single byte that crosses the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    OkDone = 0,
    OkWaitForResponse = 1,
    Error = 2,
    UnknownCommand = 3,
    ObjectDoesNotExist = 4,
    ObjectAlreadyExists = 5,
    TableAtCapacity = 6,
    QueryUnsupported = 7,
    IncorrectFormat = 8,
    FileNotFound = 9,
}

impl From<&DbxError> for StatusCode {
    fn from(err: &DbxError) -> Self {
        match err {
            DbxError::Io { .. } => StatusCode::Error,
            DbxError::ObjectDoesNotExist { .. } => StatusCode::ObjectDoesNotExist,
            DbxError::ObjectAlreadyExists { .. } => StatusCode::ObjectAlreadyExists,
            DbxError::TableAtCapacity { .. } => StatusCode::TableAtCapacity,
            DbxError::QueryUnsupported(_) => StatusCode::QueryUnsupported,
            DbxError::IncorrectFormat(_) => StatusCode::IncorrectFormat,
            DbxError::FileNotFound(_) => StatusCode::FileNotFound,
            DbxError::Error(_) => StatusCode::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_object_does_not_exist() {
        let err = DbxError::ObjectDoesNotExist {
            name: "d.t.c".to_string(),
        };
        assert_eq!(err.to_string(), "object 'd.t.c' does not exist");
    }

    #[test]
    fn error_display_table_at_capacity() {
        let err = DbxError::TableAtCapacity {
            table: "d.t".to_string(),
        };
        assert_eq!(err.to_string(), "table 'd.t' is at capacity");
    }

    #[test]
    fn status_code_mapping() {
        let err = DbxError::ObjectAlreadyExists {
            name: "d.t".to_string(),
        };
        assert_eq!(StatusCode::from(&err), StatusCode::ObjectAlreadyExists);
    }

    #[test]
    fn dbx_result_ok() {
        let result: DbxResult<i32> = Ok(42);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn dbx_result_err() {
        let result: DbxResult<i32> = Err(DbxError::QueryUnsupported("insert".into()));
        assert!(result.is_err());
    }
}
