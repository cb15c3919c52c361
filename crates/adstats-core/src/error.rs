use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a raw ad record was refused during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A `{lower_bound, upper_bound?}` range had no usable `lower_bound`.
    MissingBound(&'static str),
    /// A numeric field was present but could not be read as a number.
    InvalidNumber { field: &'static str, raw: String },
    /// A required field was absent.
    MissingField(&'static str),
    /// The delivery start date precedes the archive epoch.
    BeforeEpoch(String),
    /// The delivery start date lies after the end of the reporting window.
    AfterWindow(String),
    /// No EUR conversion rate is known for the declared currency.
    UnknownCurrency(String),
    /// A delivery date could not be parsed.
    InvalidDate(String),
    /// The `page_id` does not resolve to any party.
    UnknownPage(String),
}

impl RejectReason {
    /// Short stable label used when tallying rejections.
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::MissingBound(_) => "missing-bound",
            RejectReason::InvalidNumber { .. } => "invalid-number",
            RejectReason::MissingField(_) => "missing-field",
            RejectReason::BeforeEpoch(_) => "before-epoch",
            RejectReason::AfterWindow(_) => "after-window",
            RejectReason::UnknownCurrency(_) => "unknown-currency",
            RejectReason::InvalidDate(_) => "invalid-date",
            RejectReason::UnknownPage(_) => "unknown-page",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingBound(field) => write!(f, "{field} has no lower_bound"),
            RejectReason::InvalidNumber { field, raw } => {
                write!(f, "{field} is not a number: {raw:?}")
            }
            RejectReason::MissingField(field) => write!(f, "missing field {field}"),
            RejectReason::BeforeEpoch(date) => write!(f, "start date {date} precedes the archive"),
            RejectReason::AfterWindow(date) => {
                write!(f, "start date {date} is after the reporting window")
            }
            RejectReason::UnknownCurrency(code) => write!(f, "unknown currency {code}"),
            RejectReason::InvalidDate(raw) => write!(f, "invalid date {raw:?}"),
            RejectReason::UnknownPage(page) => write!(f, "page {page} maps to no party"),
        }
    }
}

/// All errors produced by the ad statistics crates.
#[derive(Error, Debug)]
pub enum StatsError {
    /// A raw record could not be turned into an `AdRecord`; the batch skips it.
    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: RejectReason },

    /// A read-side query named an unknown data type or demographic.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The expected input path does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No record files were found under the given directory.
    #[error("No ad record files found in {0}")]
    NoDataFiles(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StatsError {
    pub fn malformed(id: impl Into<String>, reason: RejectReason) -> Self {
        StatsError::MalformedRecord {
            id: id.into(),
            reason,
        }
    }

    /// The rejection reason, when this error is a per-record rejection.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            StatsError::MalformedRecord { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the ad statistics crates.
pub type Result<T> = std::result::Result<T, StatsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_malformed_record() {
        let err = StatsError::malformed("123", RejectReason::UnknownCurrency("GBP".into()));
        assert_eq!(err.to_string(), "Malformed record 123: unknown currency GBP");
    }

    #[test]
    fn test_error_display_missing_bound() {
        let err = StatsError::malformed("9", RejectReason::MissingBound("spend"));
        assert_eq!(err.to_string(), "Malformed record 9: spend has no lower_bound");
    }

    #[test]
    fn test_error_display_invalid_query() {
        let err = StatsError::InvalidQuery("unknown data type: clicks".to_string());
        assert_eq!(err.to_string(), "Invalid query: unknown data type: clicks");
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = StatsError::FileRead {
            path: PathBuf::from("/some/ads.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/ads.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_no_data_files() {
        let err = StatsError::NoDataFiles(PathBuf::from("/empty/dir"));
        assert_eq!(err.to_string(), "No ad record files found in /empty/dir");
    }

    #[test]
    fn test_reject_reason_only_for_malformed() {
        let err = StatsError::malformed("1", RejectReason::BeforeEpoch("2017-01-01".into()));
        assert_eq!(err.reject_reason().map(|r| r.kind()), Some("before-epoch"));
        assert!(StatsError::Config("x".into()).reject_reason().is_none());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: StatsError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
