//! # Error Handling
//!
//! Centralized error types for Quill core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Business errors raised by handlers live in [`crate::api`]; this enum covers
//! infrastructure failures (schema, database, HTTP plumbing).

use thiserror::Error;

/// Result type alias for Quill operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Quill runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Router failed to match the requested path
    #[error("No route found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A handler's parameter contract cannot be satisfied by its route
    #[error("Invalid route {method} {pattern}: parameter '{param}' {reason}")]
    InvalidRoute {
        /// HTTP method of the route
        method: String,
        /// Path pattern of the route
        pattern: String,
        /// Offending parameter
        param: String,
        /// Why the parameter is unsatisfiable
        reason: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed entity description
    #[error("Schema error for {entity}: {reason}")]
    Schema {
        /// Entity type name
        entity: String,
        /// What is wrong with the description
        reason: String,
    },

    /// Backend failure while running a statement
    #[error("Query error: {message}")]
    Query {
        /// Error message from database
        message: String,
    },

    /// No pooled connection became available in time
    #[error("Timed out waiting for a database connection")]
    PoolTimeout,

    /// Unsupported `limit` shape for a select
    #[error("Invalid limit value: {0}")]
    InvalidLimit(String),

    /// A column value cannot be converted to the target type
    #[error("Cannot decode {found} as {expected}")]
    Decode {
        /// Target type name
        expected: &'static str,
        /// Description of the value found
        found: String,
    },

    /// Request body could not be parsed
    #[error("Invalid request body: {reason}")]
    InvalidBody {
        /// Parser message
        reason: String,
    },

    /// Template collaborator failed
    #[error("Template error in {template}: {reason}")]
    Template {
        /// Template name
        template: String,
        /// Renderer message
        reason: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

impl Error {
    /// Wrap a backend error as a query failure
    pub(crate) fn query(err: impl std::fmt::Display) -> Self {
        Self::Query {
            message: err.to_string(),
        }
    }
}
