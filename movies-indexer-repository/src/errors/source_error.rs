//! Errors raised while reading from the relational source.

use std::time::Duration;

use thiserror::Error;

/// Represents errors that can occur within the movie source.
///
/// Transient variants (`Connection`, `Timeout`) are retried by the extractor;
/// everything else fails the pass immediately.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid extract options: {0}")]
    InvalidOptions(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// SQLSTATE codes that indicate the server or the link is temporarily unusable.
///
/// Class 08 is "connection exception", class 53 "insufficient resources",
/// 57P0x covers admin/crash shutdowns, 40001/40P01 are serialization failure
/// and deadlock.
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("53")
        || code.starts_with("57P0")
        || code == "40001"
        || code == "40P01"
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connection(err.to_string()),
            sqlx::Error::Database(ref db_err) => {
                let transient = db_err
                    .code()
                    .map(|code| is_transient_sqlstate(&code))
                    .unwrap_or(false);
                if transient {
                    Self::Connection(err.to_string())
                } else {
                    Self::Query(err.to_string())
                }
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_) => Self::Decode(err.to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_sqlstate() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("08001"));
        assert!(is_transient_sqlstate("53300"));
        assert!(is_transient_sqlstate("57P01"));
        assert!(is_transient_sqlstate("40001"));
        assert!(!is_transient_sqlstate("42601"));
        assert!(!is_transient_sqlstate("42P01"));
        assert!(!is_transient_sqlstate("23505"));
    }

    #[test]
    fn test_from_sqlx_io_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SourceError::from(sqlx::Error::Io(io));
        assert!(matches!(err, SourceError::Connection(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_sqlx_pool_timeout_is_transient() {
        assert!(SourceError::from(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn test_decode_errors_are_not_transient() {
        let err = SourceError::from(sqlx::Error::ColumnNotFound("persons".to_string()));
        assert!(matches!(err, SourceError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_row_not_found_is_query_error() {
        let err = SourceError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, SourceError::Query(_)));
        assert!(!err.is_transient());
    }
}
