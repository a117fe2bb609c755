//! Error types for the schema engine and entity collectors.

use thiserror::Error;

/// Result type alias for collector operations.
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Failure of the fetch collaborator for one whole document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("Transport error fetching {path}: {reason}")]
    Transport {
        /// API path that was requested.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// The API answered with a non-success status.
    #[error("HTTP {status} fetching {path}")]
    Status {
        /// API path that was requested.
        path: String,
        /// HTTP status code.
        status: u16,
    },

    /// The body could not be decoded as a JSON document.
    #[error("Decode error for {path}: {reason}")]
    Decode {
        /// API path that was requested.
        path: String,
        /// Description of the failure.
        reason: String,
    },
}

/// Inconsistency between a discovered series and its existing declaration.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    /// The same metric key was seen with two different label-dimension sets.
    #[error("Series {key} declared with labels {existing:?}, now seen with {requested:?}")]
    DimensionConflict {
        /// Normalized series key.
        key: String,
        /// Label names of the existing declaration.
        existing: Vec<String>,
        /// Label names of the conflicting sighting.
        requested: Vec<String>,
    },

    /// A value was recorded with the wrong number of label values.
    #[error("Series {key} expects {expected} label values, got {actual}")]
    LabelArity {
        /// Normalized series key.
        key: String,
        /// Number of label names on the definition.
        expected: usize,
        /// Number of label values supplied.
        actual: usize,
    },
}

/// Failure of one collector's scrape.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The document could not be fetched or decoded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The document had no usable entity list.
    #[error("Malformed document from {path}: {reason}")]
    Malformed {
        /// API path of the document.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The scrape's registry update was rejected.
    #[error("Schema error in {namespace}: {source}")]
    Schema {
        /// Namespace of the collector whose registry rejected the update.
        namespace: String,
        /// Underlying schema error.
        #[source]
        source: SchemaError,
    },
}
