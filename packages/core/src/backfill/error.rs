//! Error types for backfill operations

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors from a single call to the rate provider
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Provider returned HTTP {status}")]
    HttpError { status: u16 },

    #[error("Request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Data format error: {message}")]
    FormatError { message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl ProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::FormatError { message: message.into() }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthError { message: message.into() }
    }

    /// Map a non-success HTTP status to the matching error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::AuthError { message: body.into() },
            429 => Self::RateLimitExceeded,
            408 | 500..=599 => Self::HttpError { status },
            _ => Self::Rejected {
                status,
                message: body.into(),
            },
        }
    }

    /// Failures worth retrying the same request for.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkError { .. } | Self::HttpError { .. })
    }

    /// Failures that will not go away by retrying later in the same pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthError { .. } | Self::FormatError { .. })
    }
}

/// Errors reading or persisting monthly records
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed record {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("Failed to replace {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv { path: path.into(), source }
    }

    /// The file exists but its contents cannot be parsed as a record.
    /// Failures to reach the file at all are not included.
    pub fn is_unreadable_record(&self) -> bool {
        match self {
            Self::Malformed { .. } => true,
            Self::Csv { source, .. } => !matches!(source.kind(), csv::ErrorKind::Io(_)),
            Self::Io { .. } | Self::Persist { .. } => false,
        }
    }
}

/// Conditions that end a pass before its plan is exhausted.
///
/// Running out of quota is not one of them; it shows up as
/// `PassReport::quota_exhausted`.
#[derive(Error, Debug)]
pub enum PassError {
    #[error("Provider status unavailable: {0}")]
    ProviderUnavailable(#[source] ProviderError),

    #[error("Fatal fetch failure for {date}: {source}")]
    FatalFetch {
        date: NaiveDate,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to store rates for {date}: {source}")]
    StorageWrite {
        date: NaiveDate,
        #[source]
        source: StorageError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_expected_classes() {
        assert!(matches!(ProviderError::from_status(401, ""), ProviderError::AuthError { .. }));
        assert!(matches!(ProviderError::from_status(403, ""), ProviderError::AuthError { .. }));
        assert!(matches!(ProviderError::from_status(429, ""), ProviderError::RateLimitExceeded));
        assert!(ProviderError::from_status(500, "").is_transient());
        assert!(ProviderError::from_status(503, "").is_transient());
        assert!(ProviderError::from_status(408, "").is_transient());
        assert!(matches!(
            ProviderError::from_status(422, "bad date"),
            ProviderError::Rejected { status: 422, .. }
        ));
    }

    #[test]
    fn rate_limit_is_neither_transient_nor_fatal() {
        let err = ProviderError::RateLimitExceeded;
        assert!(!err.is_transient());
        assert!(!err.is_fatal());
    }

    #[test]
    fn auth_and_format_errors_are_fatal() {
        assert!(ProviderError::auth("invalid key").is_fatal());
        assert!(ProviderError::format("missing data").is_fatal());
        assert!(!ProviderError::network("reset").is_fatal());
    }

    #[test]
    fn only_parse_failures_count_as_unreadable_records() {
        let malformed = StorageError::Malformed {
            path: PathBuf::from("2025-01.csv"),
            message: "first column is \"da\"".into(),
        };
        let denied = StorageError::io(
            "2025-01.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );

        assert!(malformed.is_unreadable_record());
        assert!(!denied.is_unreadable_record());
    }
}
