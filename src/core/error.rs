//! Error types and caller-facing status mapping.
//!
//! Tessera distinguishes three layers of failure:
//!
//! - [`MetaError`] - reported by the metadata accessor (not-found is kept
//!   distinct from every other failure)
//! - [`CacheError`] - reported by the segment store and cache controller
//! - [`TesseraError`] - the taxonomy a lifecycle command resolves to
//!
//! Every [`TesseraError`] maps to exactly one stable [`StatusCode`]; the
//! numeric values are part of the caller contract and must not be reused.

use crate::catalog::segments::SegmentId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the metadata accessor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetaError {
    /// The named collection does not exist.
    #[error("collection {collection} not found")]
    NotFound { collection: String },

    /// The metadata store could not be reached or refused the query.
    #[error("metadata store unavailable: {message}")]
    Unavailable { message: String },

    /// The metadata store returned a record that fails its own invariants.
    #[error("metadata record corrupt: {message}")]
    Corrupt { message: String },

    /// A create request named an entity that already exists.
    #[error("{entity} already exists")]
    AlreadyExists { entity: String },
}

impl MetaError {
    /// Create a NotFound error.
    pub fn not_found(collection: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
        }
    }

    /// Create an Unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Whether this is the distinguished not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures reported by the segment store and cache controller.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading a segment from storage failed.
    #[error("segment {segment}: i/o failure: {source}")]
    Io {
        segment: SegmentId,
        #[source]
        source: std::io::Error,
    },

    /// Segment bytes do not match the checksum recorded in the catalog.
    #[error("segment {segment}: checksum mismatch (expected {expected:#018x}, got {actual:#018x})")]
    Corrupt {
        segment: SegmentId,
        expected: u64,
        actual: u64,
    },

    /// The storage layer has no data for the segment.
    #[error("segment {segment}: not present in storage")]
    Missing { segment: SegmentId },

    /// Ordinary admission refused the segment.
    ///
    /// Only the capacity-respecting path produces this; forced operations
    /// never do.
    #[error("segment {segment}: admission would exceed cache capacity ({required} bytes required, {available} available)")]
    CapacityExceeded {
        segment: SegmentId,
        required: u64,
        available: u64,
    },
}

impl CacheError {
    /// Create an Io error for a segment.
    pub fn io(segment: SegmentId, source: std::io::Error) -> Self {
        Self::Io { segment, source }
    }

    /// The segment this error concerns.
    pub fn segment(&self) -> SegmentId {
        match self {
            Self::Io { segment, .. }
            | Self::Corrupt { segment, .. }
            | Self::Missing { segment }
            | Self::CapacityExceeded { segment, .. } => *segment,
        }
    }
}

/// Error taxonomy surfaced by lifecycle commands.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Malformed collection name or partition tag; raised before any
    /// lower-layer call.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Metadata lookup reported the collection does not exist.
    #[error("collection {collection} does not exist")]
    CollectionNotFound { collection: String },

    /// The name resolves to a partition sub-collection, which is not
    /// eligible for direct lifecycle operations.
    #[error("collection {collection} is a partition of {owner}; address it through its owner's partition tags")]
    InvalidCollectionReference { collection: String, owner: String },

    /// Metadata store failure other than not-found.
    #[error(transparent)]
    Metadata(MetaError),

    /// Segment store or cache controller failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A fault nothing above anticipated, including panics caught at the
    /// command boundary.
    #[error("unexpected error: {message}")]
    Unexpected { message: String },
}

/// Coarse classification of a [`TesseraError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    InvalidArgument,
    CollectionNotFound,
    InvalidCollectionReference,
    UnderlyingFailure,
    Unexpected,
}

impl From<MetaError> for TesseraError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::NotFound { collection } => Self::CollectionNotFound { collection },
            other => Self::Metadata(other),
        }
    }
}

impl TesseraError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an Unexpected error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidArgument { .. } => ErrorClass::InvalidArgument,
            Self::CollectionNotFound { .. } => ErrorClass::CollectionNotFound,
            Self::InvalidCollectionReference { .. } => ErrorClass::InvalidCollectionReference,
            Self::Metadata(_) | Self::Cache(_) => ErrorClass::UnderlyingFailure,
            Self::Unexpected { .. } => ErrorClass::Unexpected,
        }
    }

    /// Check if retrying the same request may succeed.
    ///
    /// Forced load and release are idempotent per segment, so a request that
    /// failed on a resource fault can be retried as-is.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Metadata(MetaError::Unavailable { .. }) | Self::Cache(CacheError::Io { .. })
        )
    }

    /// The stable status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } => StatusCode::InvalidArgument,
            Self::CollectionNotFound { .. } => StatusCode::CollectionNotFound,
            Self::InvalidCollectionReference { .. } => StatusCode::InvalidCollectionReference,
            Self::Metadata(MetaError::NotFound { .. }) => StatusCode::CollectionNotFound,
            Self::Metadata(MetaError::Unavailable { .. }) => StatusCode::MetaUnavailable,
            Self::Metadata(MetaError::Corrupt { .. }) => StatusCode::MetaCorrupt,
            Self::Metadata(MetaError::AlreadyExists { .. }) => StatusCode::MetaConflict,
            Self::Cache(CacheError::Io { .. }) => StatusCode::CacheIo,
            Self::Cache(CacheError::Corrupt { .. }) => StatusCode::CacheCorrupt,
            Self::Cache(CacheError::Missing { .. }) => StatusCode::SegmentMissing,
            Self::Cache(CacheError::CapacityExceeded { .. }) => StatusCode::CacheCapacity,
            Self::Unexpected { .. } => StatusCode::UnexpectedError,
        }
    }
}

/// Result type using TesseraError.
pub type TesseraResult<T> = Result<T, TesseraError>;

// ============================================================================
// Caller-facing status
// ============================================================================

/// Stable status codes returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 0,
    InvalidArgument = 1,
    CollectionNotFound = 2,
    InvalidCollectionReference = 3,
    MetaUnavailable = 10,
    MetaCorrupt = 11,
    MetaConflict = 12,
    CacheIo = 20,
    CacheCorrupt = 21,
    SegmentMissing = 22,
    CacheCapacity = 23,
    UnexpectedError = 99,
}

impl StatusCode {
    /// Numeric value of the code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Stable string identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidArgument => "InvalidArgument",
            Self::CollectionNotFound => "CollectionNotFound",
            Self::InvalidCollectionReference => "InvalidCollectionReference",
            Self::MetaUnavailable => "MetaUnavailable",
            Self::MetaCorrupt => "MetaCorrupt",
            Self::MetaConflict => "MetaConflict",
            Self::CacheIo => "CacheIo",
            Self::CacheCorrupt => "CacheCorrupt",
            Self::SegmentMissing => "SegmentMissing",
            Self::CacheCapacity => "CacheCapacity",
            Self::UnexpectedError => "UnexpectedError",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result surface reported to the caller: a code and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    /// Successful status.
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    /// Build the status for an error.
    pub fn from_error(error: &TesseraError) -> Self {
        Self {
            code: error.status_code(),
            message: error.to_string(),
        }
    }

    /// Check if the status is OK.
    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl From<&TesseraError> for Status {
    fn from(error: &TesseraError) -> Self {
        Self::from_error(error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_not_found_becomes_collection_not_found() {
        let err: TesseraError = MetaError::not_found("c1").into();
        assert!(matches!(err, TesseraError::CollectionNotFound { ref collection } if collection == "c1"));
        assert_eq!(err.status_code(), StatusCode::CollectionNotFound);
    }

    #[test]
    fn other_meta_failures_keep_their_detail() {
        let err: TesseraError = MetaError::unavailable("connection reset").into();
        assert_eq!(err.class(), ErrorClass::UnderlyingFailure);
        assert_eq!(err.status_code(), StatusCode::MetaUnavailable);
        assert!(err.to_string().contains("connection reset"));
        assert!(err.is_retriable());
    }

    #[test]
    fn cache_io_is_retriable_but_corruption_is_not() {
        let io = TesseraError::from(CacheError::io(
            SegmentId::new(7),
            std::io::Error::new(std::io::ErrorKind::Other, "disk"),
        ));
        assert!(io.is_retriable());
        let corrupt = TesseraError::from(CacheError::Corrupt {
            segment: SegmentId::new(7),
            expected: 1,
            actual: 2,
        });
        assert!(!corrupt.is_retriable());
        assert_eq!(corrupt.status_code(), StatusCode::CacheCorrupt);
    }

    #[test]
    fn status_display_includes_code_and_message() {
        let status = Status::from_error(&TesseraError::unexpected("boom"));
        assert_eq!(status.code.as_u16(), 99);
        assert_eq!(status.to_string(), "UnexpectedError: unexpected error: boom");
        assert_eq!(Status::ok().to_string(), "OK");
    }
}
